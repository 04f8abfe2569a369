use serde_json::json;

use crate::commands::{
    block_on, booking_service, load_config, open_database, CommandResult, StepFailure,
};

pub fn run(from: Option<&str>, to: Option<&str>) -> CommandResult {
    let config = match load_config("slots") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on("slots", async {
        let pool = open_database(&config).await?;
        let service = booking_service(&config, &pool).await?;
        let available = service.list_availability(from, to);
        pool.close().await;
        Ok::<_, StepFailure>(available)
    });

    match result {
        Ok(available) => {
            let open_slots: usize = available.values().map(Vec::len).sum();
            CommandResult::success_with_data(
                "slots",
                format!("{open_slots} open slots across {} dates", available.len()),
                Some(json!({ "availableAppointments": available })),
            )
        }
        Err(failure) => failure,
    }
}
