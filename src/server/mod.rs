//! Connection admission and the accept loop.

pub mod admission;
pub mod listener;

pub use admission::{Admission, AdmissionController, Worker};
pub use listener::{ConnectionWorker, PendingConnection, Server};
