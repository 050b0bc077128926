//! Record store workflow example.
//!
//! Demonstrates the full store lifecycle the way a list view drives it:
//! lazy migration, bulk insert, prefix search, an observer that patches its
//! preview list from change events, update, and delete.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p data-bake-demos --bin bake_list
//! ```

use std::sync::{Arc, Mutex};

use data_bake_core::{DataItem, DataItemPreview};
use data_bake_sqlite::{DataBakeStore, StoreConfig};

fn main() {
    // === Step 1: Open a file-backed store ===
    let db_path = std::env::temp_dir().join("data_bake_example.sqlite");
    std::fs::remove_file(&db_path).ok();

    let store = DataBakeStore::from_config(&StoreConfig::at_path(&db_path)).unwrap();
    println!("=== Schema ===");
    println!("State before first call: {:?}", store.schema_state());
    println!("Schema version: {}", store.schema_version().unwrap());

    // === Step 2: Attach a list view that follows change events ===
    let list: Arc<Mutex<Vec<DataItemPreview>>> =
        Arc::new(Mutex::new(store.previews("", false).unwrap()));
    let view = Arc::clone(&list);
    store.subscribe(move |change| {
        println!(
            "  [event] +{} ~{} -{:?}",
            change.inserted.len(),
            change.updated.len(),
            change.deleted
        );
        change.apply_to_previews(&mut view.lock().unwrap());
    });

    // === Step 3: Bulk insert ===
    println!("\n=== Insert ===");
    let saved = store
        .insert(vec![
            DataItem::new("Sourdough", "Levain, flour, water, salt").with_rating(5.0),
            DataItem::new("Sandwich loaf", "Enriched with milk and butter"),
            DataItem::new("Soda bread", "No yeast, buttermilk").with_thumbnail(vec![0x89, 0x50]),
            DataItem::new("Focaccia", "Olive oil and rosemary").with_rating(4.5),
        ])
        .unwrap();
    for item in &saved {
        println!("  #{} {}", item.id.unwrap(), item.title);
    }

    // === Step 4: Prefix search ===
    println!("\n=== Search 'So' ===");
    for preview in store.previews("So", true).unwrap() {
        println!("  #{} {}", preview.id, preview.title);
    }

    // === Step 5: Update ===
    println!("\n=== Update ===");
    let mut loaf = saved[1].clone();
    loaf.title = "Milk bread".into();
    loaf.touch();
    println!("  updated: {}", store.update(&loaf).unwrap());

    let mut ghost = DataItem::new("Ghost", "never stored");
    ghost.id = Some(10_000);
    println!("  ghost updated: {}", store.update(&ghost).unwrap());

    // === Step 6: Delete ===
    println!("\n=== Delete ===");
    let focaccia = saved[3].id.unwrap();
    println!(
        "  removed {} of 2 requested",
        store.delete(Some(&[focaccia, 10_000])).unwrap()
    );

    println!("\nList view now shows:");
    for preview in list.lock().unwrap().iter() {
        println!("  #{} {}", preview.id, preview.title);
    }
    assert_eq!(*list.lock().unwrap(), store.previews("", false).unwrap());

    println!("\nRemoved all: {}", store.delete(None).unwrap());
    assert!(list.lock().unwrap().is_empty());

    // Cleanup
    store.close();
    std::fs::remove_file(&db_path).ok();
    println!("\nDone!");
}
