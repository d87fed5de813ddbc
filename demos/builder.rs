use json_watch_store::JsonStore;

fn main() -> Result<(), json_watch_store::Error> {
    let path = std::env::temp_dir()
        .join("json_watch_store_example")
        .join("builder.json");

    // pretty-printed JSON; the parent directory is created on open
    let db = JsonStore::builder(&path).pretty(true).build()?;

    db.set("name", "json-watch-store")?;
    db.set("version", "0.1.0")?;
    db.set("status", "watching")?;

    // the file on disk is nicely indented
    let contents = std::fs::read_to_string(db.path())?;
    println!("On-disk JSON:\n{contents}");

    println!("\nDebug output: {db:?}");

    let _ = std::fs::remove_file(&path);
    Ok(())
}
