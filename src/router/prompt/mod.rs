//! Prompt module
//!
//! Instructions given to the LLM routing policy and to LLM-backed sub-agents.

pub mod composer;

pub use composer::{build_router_instructions, build_structured_output_contract};
