use anyhow::Result;
use futures::TryStreamExt;
use serde_json::json;

use skiff::agent::Agent;
use skiff::completion::http::HttpCompletionClient;
use skiff::model::ChatModel;
use skiff::models::message::Message;
use skiff::models::tool::{RegisteredTool, Tool, ToolRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let model = ChatModel::from_catalog("NousResearch/Hermes-2-Pro-Llama-3-8B")?;
    let completion = HttpCompletionClient::new(model.endpoint())?;

    let mut tools = ToolRegistry::new();
    tools.register(RegisteredTool::new(
        Tool::new(
            "get_current_temperature",
            "Get the current temperature at a location, in the format \"City, Country\".",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The location to get the temperature for"
                    },
                    "unit": {
                        "type": "string",
                        "enum": ["celsius", "fahrenheit"]
                    }
                },
                "required": ["location", "unit"]
            }),
        ),
        |_arguments| async move {
            // A real tool should probably actually get the temperature!
            Ok("22.0".to_string())
        },
    ))?;

    let agent = Agent::new(model, Box::new(completion), tools)
        .with_system_prompt("You are a helpful assistant");

    let conversation = vec![Message::user("What is the temperature in Paris and in Lyon?")];
    let mut stream = agent.reply(&conversation, false).await?;
    while let Some(message) = stream.try_next().await? {
        println!("{}", serde_json::to_string_pretty(&message)?);
    }

    Ok(())
}
