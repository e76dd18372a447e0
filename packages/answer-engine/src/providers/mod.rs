//! Provider implementations.
//!
//! ChatGPT, Perplexity and Gemini answers are scraped through BrightData
//! datasets and share its job protocol. Linkup answers synchronously.

pub mod brightdata;
pub mod chatgpt;
pub mod gemini;
pub mod linkup;
pub mod perplexity;

pub use brightdata::BrightDataApi;
pub use chatgpt::ChatGptAdapter;
pub use gemini::GeminiAdapter;
pub use linkup::LinkupAdapter;
pub use perplexity::PerplexityAdapter;
