use bird_deck::core::deck::{read_csv, render_csv};
use bird_deck::domain::ports::Storage;
use bird_deck::{DeckRow, LocalStorage};
use tempfile::TempDir;

fn row(name: &str, description: &str, image_filename: &str) -> DeckRow {
    DeckRow {
        name: name.to_string(),
        description: description.to_string(),
        image_filename: image_filename.to_string(),
    }
}

#[tokio::test]
async fn test_csv_written_to_disk_reads_back_equal() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

    let rows = vec![
        row("Robin", "Red breast, \"cheery\" song", "robin.jpg"),
        row("Wren", "Tiny;\nloud", "wren.png"),
        row("Bewick's swan", "Smallest swan, visits in winter", "bewick-s-swan.jpg"),
        row("Garganey", "Canard sarcelle d'été", "garganey.jpg"),
        row("Quail", "", "quail.jpg"),
    ];

    storage.write_file("output.csv", &render_csv(&rows)?).await?;

    let file = std::fs::File::open(temp_dir.path().join("output.csv"))?;
    let read_back = read_csv(file)?;

    assert_eq!(read_back, rows);
    Ok(())
}

#[tokio::test]
async fn test_rewriting_csv_replaces_previous_output() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

    let first = vec![
        row("Robin", "a", "robin.jpg"),
        row("Wren", "b", "wren.jpg"),
    ];
    let second = vec![row("Bittern", "c", "bittern.jpg")];

    storage.write_file("output.csv", &render_csv(&first)?).await?;
    storage.write_file("output.csv", &render_csv(&second)?).await?;

    let read_back = read_csv(std::fs::File::open(temp_dir.path().join("output.csv"))?)?;
    assert_eq!(read_back, second);
    Ok(())
}
