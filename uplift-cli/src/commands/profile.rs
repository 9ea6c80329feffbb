use super::{cancel_on_ctrl_c, spawn_event_printer, Session};
use uplift_core::{event_channel, fetch_athlete, Database};

/// Run the `profile` command: authorize if needed and show the athlete.
pub async fn run(db: &Database) -> anyhow::Result<()> {
    let (tx, rx) = event_channel();
    let printer = spawn_event_printer(rx);
    let cancel = cancel_on_ctrl_c();

    let mut session = Session::load(db, &tx, true)?;
    let result = fetch_athlete(&session.client, &mut session.auth, &cancel).await;

    drop(session);
    drop(tx);
    let _ = printer.await;

    let athlete = result?;
    println!("Athlete");
    println!("-------");
    println!("Name:    {}", athlete.display_name());
    println!("Id:      {}", athlete.id);
    if let Some(city) = athlete.city.as_deref().filter(|c| !c.is_empty()) {
        println!("City:    {city}");
    }
    if let Some(country) = athlete.country.as_deref().filter(|c| !c.is_empty()) {
        println!("Country: {country}");
    }

    Ok(())
}
