//! In-memory stand-ins for the model and Asana used by unit tests.

mod fixture_asana;
mod scripted_llm;

pub use fixture_asana::FixtureAsana;
pub use scripted_llm::{ScriptedLLM, StreamBreak};
