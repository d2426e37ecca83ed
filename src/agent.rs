//! Conversational flight agent
//!
//! The agent owns the conversation history and wires one tool,
//! `search_flights`, to a [`FlightSearch`]. The model decides when to call it.

use crate::gemini::{
    ChatModel, Content, FunctionCall, FunctionDeclaration, GenerateContentRequest, GenerationConfig,
    ModelError, Part, Tool,
};
use crate::recommend::summarize;
use crate::search::FlightSearch;
use crate::FlightError;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

pub const SEARCH_TOOL_NAME: &str = "search_flights";

/// Tool rounds allowed within one user turn before the agent stops asking.
pub const MAX_TOOL_ROUNDS: usize = 4;

const MAX_TOOL_ALTERNATIVES: usize = 5;

/// Said instead of the model's reply when it is still asking for tools after
/// [`MAX_TOOL_ROUNDS`].
pub const TOOL_LIMIT_REPLY: &str =
    "I searched several times but could not settle on an answer. Could you rephrase or narrow the request?";

/// Arguments of a `search_flights` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchFlightsArgs {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

/// Function declaration sent with every request.
pub fn search_tool_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: SEARCH_TOOL_NAME.to_string(),
        description: "Searches for direct flights between two airport codes for a specific date."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "origin": {
                    "type": "STRING",
                    "description": "The 3-letter IATA code for the origin city (e.g., 'DEL')."
                },
                "destination": {
                    "type": "STRING",
                    "description": "The 3-letter IATA code for the destination city (e.g., 'BOM')."
                },
                "date": {
                    "type": "STRING",
                    "description": "The date of travel in 'YYYY-MM-DD' format."
                }
            },
            "required": ["origin", "destination", "date"]
        }),
    }
}

pub fn system_prompt(today: NaiveDate) -> String {
    format!(
        "You are a helpful flight assistant. Today is {}. When searching, convert city names to \
         Airport Codes (e.g. Delhi -> DEL). Always use YYYY-MM-DD format for dates.",
        today
    )
}

/// Chat agent over a [`ChatModel`] with fallback models.
pub struct FlightAgent<M, S> {
    model: M,
    search: S,
    current_model: String,
    fallback_models: Vec<String>,
    system_instruction: Content,
    history: Vec<Content>,
}

impl<M: ChatModel, S: FlightSearch> FlightAgent<M, S> {
    pub fn new(
        model: M,
        search: S,
        primary_model: impl Into<String>,
        fallback_models: Vec<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            model,
            search,
            current_model: primary_model.into(),
            fallback_models,
            system_instruction: Content::system(system_prompt(today)),
            history: Vec::new(),
        }
    }

    /// Model currently answering; changes after a successful fallback.
    pub fn current_model(&self) -> &str {
        &self.current_model
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Handle one user message and return the model's final text.
    ///
    /// On error the turn is dropped from the history, so the next message
    /// starts from the last good state.
    pub async fn respond(&mut self, user_input: &str) -> Result<String, ModelError> {
        let checkpoint = self.history.len();
        self.history.push(Content::user_text(user_input));

        match self.run_turn().await {
            Ok(text) => Ok(text),
            Err(e) => {
                self.history.truncate(checkpoint);
                Err(e)
            }
        }
    }

    async fn run_turn(&mut self) -> Result<String, ModelError> {
        let mut reply = self.generate_with_fallback().await?;

        for round in 0..MAX_TOOL_ROUNDS {
            let calls: Vec<FunctionCall> = reply.function_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                break;
            }
            info!(round, calls = calls.len(), "Model requested tool calls");

            self.history.push(reply);
            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                let output = self.run_tool(call).await;
                responses.push(Part::function_response(
                    call.name.clone(),
                    json!({ "result": output }),
                ));
            }
            self.history.push(Content::function_responses(responses));

            reply = self.generate_with_fallback().await?;
        }

        if !reply.function_calls().is_empty() {
            // every functionCall in the history must be followed by its response
            warn!(max_rounds = MAX_TOOL_ROUNDS, "Model kept calling tools; returning without them");
            let text = match reply.text() {
                text if text.is_empty() => TOOL_LIMIT_REPLY.to_string(),
                text => text,
            };
            self.history.push(Content::model_text(text.clone()));
            return Ok(text);
        }

        let text = reply.text();
        self.history.push(reply);
        Ok(text)
    }

    async fn run_tool(&self, call: &FunctionCall) -> String {
        if call.name != SEARCH_TOOL_NAME {
            warn!(tool = %call.name, "Model called an unknown tool");
            return format!("Unknown tool: {}", call.name);
        }

        let args: SearchFlightsArgs = match serde_json::from_value(call.args.clone()) {
            Ok(args) => args,
            Err(e) => return format!("Invalid arguments for {}: {}", SEARCH_TOOL_NAME, e),
        };

        info!(
            origin = %args.origin,
            destination = %args.destination,
            date = %args.date,
            "AGENT ACTION: searching flights"
        );
        let outcome = self
            .search
            .search(&args.origin, &args.destination, &args.date)
            .await;
        describe_outcome(outcome)
    }

    fn build_request(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Some(self.system_instruction.clone()),
            contents: self.history.clone(),
            tools: vec![Tool {
                function_declarations: vec![search_tool_declaration()],
            }],
            generation_config: Some(GenerationConfig { temperature: 0.0 }),
        }
    }

    /// Ask the current model; on a missing model or exhausted quota try each
    /// fallback in order and keep the first that answers.
    async fn generate_with_fallback(&mut self) -> Result<Content, ModelError> {
        let request = self.build_request();
        let err = match self.model.generate(&self.current_model, &request).await {
            Ok(content) => return Ok(content),
            Err(e) if e.is_fallback_candidate() => e,
            Err(e) => return Err(e),
        };
        warn!(model = %self.current_model, error = %err, "Model call failed; trying fallbacks");

        for fallback in &self.fallback_models {
            if *fallback == self.current_model {
                continue;
            }
            info!(model = %fallback, "Attempting fallback model");
            match self.model.generate(fallback, &request).await {
                Ok(content) => {
                    info!(from = %self.current_model, to = %fallback, "Fallback succeeded");
                    self.current_model = fallback.clone();
                    return Ok(content);
                }
                Err(e) => warn!(model = %fallback, error = %e, "Fallback failed"),
            }
        }

        Err(err)
    }
}

/// Text the model receives as the result of a search.
pub fn describe_outcome(outcome: Result<Vec<crate::FlightOption>, FlightError>) -> String {
    match outcome {
        Ok(flights) => summarize(&flights, MAX_TOOL_ALTERNATIVES),
        Err(FlightError::NoResults(_)) => "I found no flights or there was an API error.".to_string(),
        Err(FlightError::CityNotFound(city)) => format!(
            "Could not resolve {:?} to an airport code. Use a 3-letter IATA code.",
            city
        ),
        Err(e) => format!("The flight search failed: {}", e),
    }
}
