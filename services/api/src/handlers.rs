//! Axum Handlers for the REST API
//!
//! `POST /process/` runs one conversational turn: validate the form, turn
//! speech into text if needed, ask the conversation's model, and answer in
//! text or speech. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use colloquy_core::{
    prompt::{PromptRegistry, PromptTemplate},
    synthesis::DEFAULT_LANGUAGE,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    audio_files,
    models::{ConversationView, ErrorResponse, Modality, ProcessResponse, TurnForm},
    state::AppState,
};

pub const AUDIO_MP3: &str = "audio/mp3";
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

const NO_USER_INPUT: &str = "No user input provided";

#[derive(Debug)]
pub enum ApiError {
    MissingInput(String),
    MissingField(String),
    InvalidField(String),
    UnknownTemplate(String),
    BadRequest(String),
    NotFound(String),
    Transcription(anyhow::Error),
    Synthesis(anyhow::Error),
    ModelInvocation(anyhow::Error),
    InternalServerError(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingInput(_)
            | ApiError::MissingField(_)
            | ApiError::InvalidField(_)
            | ApiError::UnknownTemplate(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Transcription(_) | ApiError::Synthesis(_) | ApiError::ModelInvocation(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::MissingInput(message)
            | ApiError::MissingField(message)
            | ApiError::InvalidField(message)
            | ApiError::UnknownTemplate(message)
            | ApiError::BadRequest(message)
            | ApiError::NotFound(message) => message,
            ApiError::Transcription(err) => {
                error!("Transcription failed: {:?}", err);
                format!("Failed to transcribe audio: {}", err)
            }
            ApiError::Synthesis(err) => {
                error!("Speech synthesis failed: {:?}", err);
                format!("Failed to synthesize speech: {}", err)
            }
            ApiError::ModelInvocation(err) => {
                error!("Language model call failed: {:?}", err);
                format!("Language model call failed: {}", err)
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                "An internal server error occurred.".to_string()
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Where the text of a turn comes from.
#[derive(Debug)]
pub enum TurnInput {
    Text(String),
    Speech(Bytes),
}

/// A request that passed validation and is ready to run.
#[derive(Debug)]
pub struct ValidatedTurn {
    pub conversation_id: String,
    pub input: TurnInput,
    pub output_method: Modality,
    pub template: Arc<PromptTemplate>,
}

fn parse_modality(value: &str, field: &str) -> Result<Modality, ApiError> {
    value
        .parse()
        .map_err(|e| ApiError::InvalidField(format!("Invalid {}: {}", field, e)))
}

/// Checks a form in a fixed order, failing on the first problem found.
///
/// Nothing here touches the session store or any model.
pub fn validate_turn(form: TurnForm, prompts: &PromptRegistry) -> Result<ValidatedTurn, ApiError> {
    if form.user_input.is_none() && form.audio_file.is_none() {
        return Err(ApiError::MissingInput(NO_USER_INPUT.to_string()));
    }
    let template_name = form
        .prompt_template
        .ok_or_else(|| ApiError::MissingField("No prompt template provided".to_string()))?;
    let input_method = form
        .input_method
        .ok_or_else(|| ApiError::MissingField("No input method provided".to_string()))?;
    let output_method = form
        .output_method
        .ok_or_else(|| ApiError::MissingField("No output method provided".to_string()))?;

    let input_method = parse_modality(&input_method, "input method")?;
    let output_method = parse_modality(&output_method, "output method")?;

    let template = prompts
        .get(&template_name)
        .map_err(|e| ApiError::UnknownTemplate(e.to_string()))?;

    let input = match input_method {
        Modality::Speech => TurnInput::Speech(form.audio_file.ok_or_else(|| {
            ApiError::MissingInput("No audio file provided for speech input".to_string())
        })?),
        Modality::Text => TurnInput::Text(
            form.user_input
                .ok_or_else(|| ApiError::MissingInput(NO_USER_INPUT.to_string()))?,
        ),
    };

    let conversation_id = form
        .conversation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(ValidatedTurn {
        conversation_id,
        input,
        output_method,
        template,
    })
}

/// Maps a failed multipart extraction onto the JSON error shape.
///
/// A body that is empty or not `multipart/form-data` at all carries no user
/// input, so it is reported the same way as a form with neither field.
pub fn multipart_rejection(rejection: MultipartRejection) -> ApiError {
    match rejection {
        MultipartRejection::InvalidBoundary(_) => ApiError::MissingInput(NO_USER_INPUT.to_string()),
        other => ApiError::BadRequest(other.body_text()),
    }
}

/// Stages uploaded audio on disk, transcribes it, and removes the file again
/// whether or not transcription succeeded.
async fn transcribe_upload(state: &AppState, audio: &[u8]) -> Result<String, ApiError> {
    let upload = audio_files::persist_upload(&state.temp_dir, audio).await?;
    let result = state.transcriber.transcribe(upload.path()).await;
    drop(upload);

    let text = result.map_err(ApiError::Transcription)?;
    if text.trim().is_empty() {
        return Err(ApiError::MissingInput(NO_USER_INPUT.to_string()));
    }
    Ok(text)
}

/// Run one conversational turn.
///
/// Returns JSON for `Text` output and an MP3 body for `Speech` output.
#[utoipa::path(
    post,
    path = "/process/",
    request_body(content = TurnForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "The model's reply", content(
            (ProcessResponse = "application/json"),
            (String = "audio/mp3")
        )),
        (status = 400, description = "Invalid or incomplete request", body = ErrorResponse),
        (status = 502, description = "Transcription, model or synthesis failure", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(name = "process_turn", skip_all, fields(conversation_id, input_method))]
pub async fn process_conversation(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(multipart_rejection)?;
    let form = TurnForm::from_multipart(multipart)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let turn = validate_turn(form, &state.prompts)?;

    let span = tracing::Span::current();
    span.record("conversation_id", turn.conversation_id.as_str());

    let user_text = match turn.input {
        TurnInput::Text(text) => {
            span.record("input_method", "Text");
            text
        }
        TurnInput::Speech(audio) => {
            span.record("input_method", "Speech");
            transcribe_upload(&state, &audio).await?
        }
    };

    let session = state
        .sessions
        .get_or_create(&turn.conversation_id, turn.template)
        .await;
    let reply = session
        .respond(&user_text)
        .await
        .map_err(ApiError::ModelInvocation)?;
    info!(output_method = %turn.output_method, reply_chars = reply.len(), "Turn complete");

    match turn.output_method {
        Modality::Text => Ok(Json(ProcessResponse {
            response: reply,
            conversation_id: turn.conversation_id,
        })
        .into_response()),
        Modality::Speech => {
            let audio = state
                .synthesizer
                .synthesize(&reply, DEFAULT_LANGUAGE)
                .await
                .map_err(ApiError::Synthesis)?;
            let body = audio_files::stage_response(&state.temp_dir, &audio).await?;

            let mut response = ([(header::CONTENT_TYPE, AUDIO_MP3)], body).into_response();
            if let Ok(value) = HeaderValue::from_str(&turn.conversation_id) {
                response
                    .headers_mut()
                    .insert(CONVERSATION_ID_HEADER, value);
            }
            Ok(response)
        }
    }
}

/// List the available prompt templates.
#[utoipa::path(
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Template names", body = [String])
    )
)]
pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.prompts.names())
}

/// Get the remembered history of a conversation.
#[utoipa::path(
    get,
    path = "/conversations/{id}",
    responses(
        (status = 200, description = "Conversation details", body = ConversationView),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Conversation ID")
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Conversation with id '{}' not found", id)))?;

    Ok(Json(ConversationView {
        conversation_id: session.id().to_string(),
        template: session.template().name.clone(),
        turns: session.turns().await.into_iter().map(Into::into).collect(),
        created_at: session.created_at(),
    }))
}
