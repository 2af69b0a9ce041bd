//! Transport implementations, one per backend family.

pub mod managed;
pub mod openai_compat;

pub use managed::ManagedTransport;
pub use openai_compat::OpenAiCompatTransport;
