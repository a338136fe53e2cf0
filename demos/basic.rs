//! A thin illustration of the public surface: build a bank, start it,
//! feed it a few rides, and print its aggregated event streams. Not a
//! reimplementation of the CLI/HTTP shell those streams are meant for.

use std::sync::Arc;
use std::time::Duration;

use elevator_bank::{Bank, Config, InsertOrder};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = Config { nr_of_elevators: 3, min_floor: 0, max_floor: 10, initial_floor: 0, ..Config::default() };
    let _ = elevator_bank::logging::init_logging(config.log_level.into());

    let bank = Bank::new(config, Arc::new(InsertOrder)).expect("valid config");

    let mut state_events = bank.subscribe_state();
    let mut availability_events = bank.subscribe_availability();

    tokio::spawn(async move {
        while let Ok(event) = availability_events.recv().await {
            println!("availability: {event:?}");
        }
    });
    tokio::spawn(async move {
        while let Ok(event) = state_events.recv().await {
            println!("state: {event:?}");
        }
    });

    bank.start();

    for (pickup, dropoff) in [(5, Some(8)), (2, None), (9, Some(0))] {
        match bank.add_ride(pickup, dropoff).await {
            Ok(id) => println!("assigned pickup={pickup} dropoff={dropoff:?} to elevator {id}"),
            Err(e) => eprintln!("ride rejected: {e}"),
        }
    }

    tokio::time::sleep(Duration::from_secs(30)).await;
    bank.shutdown();
}
