use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use crate::aleph::{AlephClient, AlephVolume, PROGRAM_ENTRYPOINT, PROGRAM_RUNTIME};
use crate::error::BackendError;
use crate::state::AppState;
use crate::storage;
use crate::types::{
    AgentRecord, DeleteAgentBody, FetchedAgent, SetupAgentBody, UpdateAgentResponse,
};

async fn fetch_agents(
    client: &AlephClient,
    tags: &[String],
) -> Result<Vec<FetchedAgent>, BackendError> {
    let posts = client.get_posts(tags).await?;
    posts
        .into_iter()
        .map(|post| {
            let record: AgentRecord = serde_json::from_value(post.content)?;
            Ok(FetchedAgent {
                record,
                post_hash: post.item_hash,
            })
        })
        .collect()
}

/// Setup a new agent on subscription
async fn setup_agent(
    State(state): State<AppState>,
    Json(body): Json<SetupAgentBody>,
) -> Result<StatusCode, BackendError> {
    if body.password != state.password {
        return Err(BackendError::InvalidPassword);
    }

    let agent_id = Uuid::new_v4().to_string();
    let secret = Uuid::new_v4().to_string();
    let encrypted_secret = state.sealer.seal(&secret)?;

    let record = AgentRecord {
        id: agent_id.clone(),
        subscription_id: body.subscription_id.clone(),
        vm_hash: None,
        encrypted_secret,
        last_update: Utc::now().timestamp(),
        tags: vec![agent_id.clone(), body.subscription_id, body.account.address],
    };

    state
        .aleph
        .create_post(serde_json::to_value(&record)?, &state.agent_post_type, None)
        .await?;

    tracing::info!(agent = %agent_id, "agent registered");
    Ok(StatusCode::OK)
}

struct UpdateAgentForm {
    agent_id: String,
    secret: String,
    code: Vec<u8>,
    code_filename: Option<String>,
    packages: Vec<u8>,
    packages_filename: Option<String>,
}

impl UpdateAgentForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, BackendError> {
        let mut agent_id = None;
        let mut secret = None;
        let mut code = None;
        let mut code_filename = None;
        let mut packages = None;
        let mut packages_filename = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("agent_id") => agent_id = Some(field.text().await?),
                Some("secret") => secret = Some(field.text().await?),
                Some("code") => {
                    code_filename = field.file_name().map(str::to_string);
                    code = Some(field.bytes().await?.to_vec());
                }
                Some("packages") => {
                    packages_filename = field.file_name().map(str::to_string);
                    packages = Some(field.bytes().await?.to_vec());
                }
                _ => {}
            }
        }

        Ok(UpdateAgentForm {
            agent_id: agent_id.ok_or(BackendError::MissingField("agent_id"))?,
            secret: secret.ok_or(BackendError::MissingField("secret"))?,
            code: code.ok_or(BackendError::MissingField("code"))?,
            code_filename,
            packages: packages.ok_or(BackendError::MissingField("packages"))?,
            packages_filename,
        })
    }
}

/// Deploy an agent or update it
async fn update_agent(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UpdateAgentResponse>, BackendError> {
    let form = UpdateAgentForm::from_multipart(multipart).await?;

    let mut agents = fetch_agents(&state.aleph, &[form.agent_id.clone()]).await?;
    if agents.len() != 1 {
        return Err(BackendError::AgentNotFound(form.agent_id));
    }
    let agent = agents.remove(0);

    let stored_secret = state.sealer.open(&agent.record.encrypted_secret)?;
    if form.secret != stored_secret {
        return Err(BackendError::SecretMismatch);
    }

    let program = match &agent.record.vm_hash {
        Some(vm_hash) => Some((vm_hash.clone(), state.aleph.get_program(vm_hash).await?)),
        None => None,
    };
    let previous_code_ref = program.as_ref().map(|(_, p)| p.code.item_ref.clone());
    // TODO: pick the packages volume by mount point instead of position
    let previous_packages_ref = program
        .as_ref()
        .and_then(|(_, p)| p.volumes.first().map(|v| v.item_ref.clone()));

    let code_ref = storage::upload_file(
        &state.aleph,
        &state.gateway_url,
        form.code,
        form.code_filename.as_deref(),
        previous_code_ref.as_deref(),
    )
    .await?;
    let packages_ref = storage::upload_file(
        &state.aleph,
        &state.gateway_url,
        form.packages,
        form.packages_filename.as_deref(),
        previous_packages_ref.as_deref(),
    )
    .await?;

    if let Some((vm_hash, _)) = program {
        // Already deployed: the store messages above moved its volumes
        // forward, the program itself stays in place
        return Ok(Json(UpdateAgentResponse { vm_hash }));
    }

    let vm_hash = state
        .aleph
        .create_program(
            &code_ref,
            PROGRAM_ENTRYPOINT,
            PROGRAM_RUNTIME,
            vec![AlephVolume {
                comment: "Dependencies".to_string(),
                mount: "/opt/packages".to_string(),
                item_ref: packages_ref,
                use_latest: true,
            }],
        )
        .await?;

    let updated = AgentRecord {
        vm_hash: Some(vm_hash.clone()),
        last_update: Utc::now().timestamp(),
        ..agent.record
    };
    state
        .aleph
        .create_post(
            serde_json::to_value(&updated)?,
            "amend",
            Some(&agent.post_hash),
        )
        .await?;

    tracing::info!(agent = %updated.id, vm_hash = %vm_hash, "agent deployed");
    Ok(Json(UpdateAgentResponse { vm_hash }))
}

/// Remove an agent on subscription end
async fn delete_agent(
    State(state): State<AppState>,
    Json(body): Json<DeleteAgentBody>,
) -> Result<StatusCode, BackendError> {
    if body.password != state.password {
        return Err(BackendError::InvalidPassword);
    }
    // Teardown of the deployed program is not implemented yet
    Ok(StatusCode::NOT_IMPLEMENTED)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/agent",
            post(setup_agent).put(update_agent).delete(delete_agent),
        )
        .with_state(state)
}
