use json_watch_store::JsonStore;
use std::sync::mpsc;
use std::time::Duration;

fn main() -> Result<(), json_watch_store::Error> {
    let path = std::env::temp_dir().join("json_watch_store_example_two.json");
    let _ = std::fs::remove_file(&path);

    let writer = JsonStore::open(&path)?;
    let reader = JsonStore::open(&path)?;

    let (tx, rx) = mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    let _sub = reader.changes().subscribe(move || {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(());
        }
    })?;
    println!("reader watching: {}", reader.is_watching());

    for round in 1..=3 {
        writer.set("round", round)?;
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(()) => println!("reader saw round {:?}", reader.get("round")),
            Err(_) => println!("no change event within 5s"),
        }
    }

    reader.close();
    let _ = std::fs::remove_file(&path);
    Ok(())
}
