mod configuration;
mod error;
mod routes;
mod state;

use anyhow::Result;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use skiff::agent::Agent;
use skiff::completion::http::HttpCompletionClient;
use skiff::model::ChatModel;
use skiff::models::tool::{RegisteredTool, Tool, ToolRegistry};

use configuration::Settings;
use state::AppState;

fn build_agent(settings: &Settings) -> Result<Agent> {
    let mut model = ChatModel::from_catalog(&settings.model.id)?;
    if let Some(endpoint) = &settings.model.endpoint {
        model = model.with_endpoint(endpoint);
    }
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

    Ok(Agent::new(model, Box::new(completion), tools)
        .with_system_prompt(settings.model.system_prompt.clone())
        .with_max_tool_call_depth(settings.model.max_tool_call_depth))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;
    let agent = build_agent(&settings)?;
    info!(model = %settings.model.id, "agent ready");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(AppState::new(agent)).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
