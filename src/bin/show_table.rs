use parquet::file::reader::{FileReader, SerializedFileReader};
use sp500pe::table::{parquet::read_table, schema_of};
use std::{env, fs::File, path::Path, process::exit};

fn main() {
    // Expect one path, optionally followed by the number of rows to print.
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <PARQUET_FILE> [ROWS]", args[0]);
        exit(1);
    }
    let rows = match args.get(2).map(|n| n.parse::<usize>()) {
        None => None,
        Some(Ok(n)) => Some(n),
        Some(Err(e)) => {
            eprintln!("Error: bad row count: {}", e);
            exit(1);
        }
    };
    if let Err(e) = show_table(Path::new(&args[1]), rows) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Print file metadata, the column types, and the rows of a table written
/// by `sp500pe` (a history file or a projection snapshot).
fn show_table(path: &Path, rows: Option<usize>) -> anyhow::Result<()> {
    let reader = SerializedFileReader::new(File::open(path)?)?;
    let file_meta = reader.metadata().file_metadata();
    println!("=== {} ===", path.display());
    println!(
        "Created by:           {}",
        file_meta.created_by().unwrap_or("<unknown>")
    );
    println!("Total rows:           {}", file_meta.num_rows());
    println!("File-size on disk:    {} bytes", std::fs::metadata(path)?.len());
    println!();

    let table = read_table(path)?;
    println!("=== Columns ===");
    for (name, dtype) in schema_of(&table) {
        println!("- {:<30} | {}", name, dtype);
    }
    println!();

    let table = match rows {
        Some(n) => table.head(Some(n)),
        None => table,
    };
    println!("{}", table);
    Ok(())
}
