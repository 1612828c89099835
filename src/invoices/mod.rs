//! Invoices issued by freelancers to clients

pub mod models;
pub mod services;
pub mod validators;


pub use models::{Invoice, InvoiceStatus, IssueInvoiceRequest};
pub use services::InvoiceService;
