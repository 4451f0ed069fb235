use sitecms::{config::Config, storage};

const DEFAULT_SCHEMA: &str = "sql/01-CREATE_TABLE.sql";

fn print_usage_and_exit() -> ! {
    eprintln!("Usage: sitecms-migrate [schema.sql]");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1); // 跳过程序名

    let file = args.next().unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
    if args.next().is_some() {
        eprintln!("Too many arguments provided.");
        print_usage_and_exit();
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    let url = match config.database_url() {
        Ok(url) => url,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let db = match storage::new_db_pool(url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    match storage::migrate(&db, &file).await {
        Ok(n) => println!("Applied {n} statements from {file}"),
        Err(e) => {
            eprintln!("Migration failed: {e}");
            std::process::exit(1);
        }
    }
}
