use std::path::PathBuf;

use tempfile::TempDir;

/// A small shop database on disk; removed when dropped.
pub struct ShopDb {
    _dir: TempDir,
    pub path: PathBuf,
}

pub fn shop_db() -> anyhow::Result<ShopDb> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shop.db");
    let conn = rusqlite::Connection::open(&path)?;
    conn.execute_batch(
        "CREATE TABLE customers (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             email TEXT
         );
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             customer_id INTEGER NOT NULL REFERENCES customers(id),
             total REAL NOT NULL,
             placed_at TEXT
         );
         INSERT INTO customers (id, name, email) VALUES
             (1, 'Alice Smith', 'alice@example.com'),
             (2, 'Bob Jones', NULL),
             (3, 'Carol White', 'carol@example.com');
         INSERT INTO orders (id, customer_id, total, placed_at) VALUES
             (1, 1, 19.5, '2024-01-03'),
             (2, 1, 42.0, '2024-01-09'),
             (3, 2, 7.25, '2024-02-11'),
             (4, 3, 120.0, '2024-02-14'),
             (5, 3, 64.1, '2024-03-01'),
             (6, 2, 15.0, '2024-03-07'),
             (7, 1, 88.8, '2024-03-21'),
             (8, 3, 3.5, '2024-04-02');",
    )?;
    Ok(ShopDb { _dir: dir, path })
}
