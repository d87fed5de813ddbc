use json_watch_store::{json, JsonStore};

fn main() -> Result<(), json_watch_store::Error> {
    let path = std::env::temp_dir().join("json_watch_store_example_basic.json");
    let db = JsonStore::open(&path)?;

    // set / get
    db.set("apples", 3)?;
    db.set("basket", json!({"owner": "sam", "items": ["pear", "plum"]}))?;
    println!("apples = {:?}", db.get("apples"));
    println!("basket = {:?}", db.get("basket"));

    // values are copies; editing one changes nothing in the store
    let mut basket = db.get("basket").unwrap_or_default();
    basket["owner"] = json!("alex");
    println!("still   = {:?}", db.get("basket").map(|b| b["owner"].clone()));

    // reserved keys are ignored
    db.set("__proto__", "nope")?;
    println!("__proto__ stored? {}", db.contains_key("__proto__"));

    // snapshots
    println!("keys = {:?}", db.keys());
    println!("len  = {}", db.len());

    db.remove("apples")?;
    println!("after remove: {:?}", db.snapshot());

    let _ = std::fs::remove_file(&path);
    Ok(())
}
