mod pdf;

pub use pdf::PdfExportWriter;
