pub mod agent;
pub mod completion;
pub mod errors;
pub mod formats;
pub mod model;
pub mod models;
pub mod prompt_template;
pub mod token_counter;
