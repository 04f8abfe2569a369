use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::commands::{
    action_router, block_on, load_config, open_database, CommandResult, StepFailure,
};

/// Exit code 0 only when the envelope reports success; a rejected or failed
/// action still prints its full response envelope.
pub fn run(file: &Path) -> CommandResult {
    let envelope = match read_envelope(file) {
        Ok(envelope) => envelope,
        Err(message) => return CommandResult::failure("invoke", "input", message, 7),
    };

    let config = match load_config("invoke") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on("invoke", async {
        let pool = open_database(&config).await?;
        let router = action_router(&config, &pool).await?;
        let response = router.dispatch(envelope).await;
        pool.close().await;
        Ok::<_, StepFailure>(response)
    });

    let response = match result {
        Ok(response) => response,
        Err(failure) => return failure,
    };

    let message = format!("{} answered with status {}", response.action_id, response.status_code);
    let data = serde_json::to_value(&response).ok();
    if response.is_success() {
        CommandResult::success_with_data("invoke", message, data)
    } else {
        let error_class =
            response.body["errorClass"].as_str().unwrap_or("action_failed").to_string();
        CommandResult::failure_with_data("invoke", &error_class, message, 1, data)
    }
}

fn read_envelope(file: &Path) -> Result<Value, String> {
    let raw = fs::read_to_string(file)
        .map_err(|error| format!("could not read `{}`: {error}", file.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("`{}` is not valid JSON: {error}", file.display()))
}
