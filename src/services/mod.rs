pub mod chain;
pub mod llm;
pub mod observer;
pub mod planner;
pub mod prompts;
pub mod validate;
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;
