use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use kitedb::query::ResultCell;
use kitedb::{Config, KiteDB, Result};

/// Interactive shell for KiteDB databases.
///
/// Databases live as individual files under the data directory; graph
/// queries are forwarded verbatim to the selected database.
#[derive(Parser)]
#[command(name = "kitedb", version, about = "KiteDB graph database shell")]
struct Args {
    /// Directory holding database files
    #[arg(long, default_value = "databases")]
    data_dir: PathBuf,
    /// Page size for databases opened by this shell
    #[arg(long, default_value_t = kitedb::storage::DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Buffer pool capacity in pages
    #[arg(long, default_value_t = kitedb::pager::DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,
}

#[derive(Serialize)]
struct Response {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Response {
    fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            data: None,
        }
    }

    fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(text) => println!("{text}"),
            Err(err) => eprintln!("failed to render response: {err}"),
        }
    }
}

struct Shell {
    data_dir: PathBuf,
    config: Config,
    current: Option<(String, KiteDB)>,
}

impl Shell {
    fn new(args: Args) -> Self {
        Self {
            data_dir: args.data_dir,
            config: Config {
                page_size: args.page_size,
                buffer_capacity: args.buffer_capacity,
            },
            current: None,
        }
    }

    fn db_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.db"))
    }

    fn dispatch(&mut self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line == ".exit" {
            return Some(Response::success("bye", None));
        }
        if line == ".help" {
            return Some(Response::success(HELP.trim_end(), None));
        }

        let upper = line.to_ascii_uppercase();
        let response = if let Some(name) = strip_verb(&upper, line, "CREATE DATABASE") {
            self.create_database(&name)
        } else if let Some(name) = strip_verb(&upper, line, "DROP DATABASE") {
            self.drop_database(&name)
        } else if let Some(name) = strip_verb(&upper, line, "USE") {
            self.use_database(&name)
        } else if upper == "SHOW DATABASES" {
            self.show_databases()
        } else if upper == "SHOW NODES" {
            self.show_nodes()
        } else if upper == "SHOW EDGES" {
            self.show_edges()
        } else if upper == "DESCRIBE DATABASE" {
            self.describe_database()
        } else if upper == "CLEAR DATABASE" {
            self.clear_database()
        } else {
            self.run_query(line)
        };
        Some(response.unwrap_or_else(|err| Response::error(err.to_string())))
    }

    fn create_database(&mut self, name: &str) -> Result<Response> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.db_path(name);
        if path.exists() {
            return Ok(Response::error(format!("database {name} already exists")));
        }
        KiteDB::open_with_config(&path, self.config.clone())?.close()?;
        Ok(Response::success(format!("created database {name}"), None))
    }

    fn drop_database(&mut self, name: &str) -> Result<Response> {
        let path = self.db_path(name);
        if !path.exists() {
            return Ok(Response::error(format!("database {name} does not exist")));
        }
        let dropping_current = self.current.as_ref().is_some_and(|(n, _)| n == name);
        if dropping_current {
            let (_, db) = self.current.take().expect("current database");
            db.close()?;
        }
        fs::remove_file(&path)?;
        Ok(Response::success(format!("dropped database {name}"), None))
    }

    fn use_database(&mut self, name: &str) -> Result<Response> {
        let path = self.db_path(name);
        if !path.exists() {
            return Ok(Response::error(format!("database {name} does not exist")));
        }
        if let Some((_, db)) = self.current.take() {
            db.close()?;
        }
        let db = KiteDB::open_with_config(&path, self.config.clone())?;
        self.current = Some((name.to_string(), db));
        Ok(Response::success(format!("using database {name}"), None))
    }

    fn show_databases(&self) -> Result<Response> {
        let mut names = Vec::new();
        if self.data_dir.is_dir() {
            for entry in fs::read_dir(&self.data_dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "db") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort_unstable();
        Ok(Response::success(
            format!("{} database(s)", names.len()),
            Some(json!(names)),
        ))
    }

    fn show_nodes(&mut self) -> Result<Response> {
        let (_, db) = self.require_database()?;
        let nodes: Vec<ResultCell> = db.all_nodes()?.iter().map(ResultCell::from_node).collect();
        Ok(Response::success(
            format!("{} node(s)", nodes.len()),
            Some(serde_json::to_value(nodes).expect("nodes serialize")),
        ))
    }

    fn show_edges(&mut self) -> Result<Response> {
        let (_, db) = self.require_database()?;
        let edges: Vec<ResultCell> = db.all_edges()?.iter().map(ResultCell::from_edge).collect();
        Ok(Response::success(
            format!("{} edge(s)", edges.len()),
            Some(serde_json::to_value(edges).expect("edges serialize")),
        ))
    }

    fn describe_database(&mut self) -> Result<Response> {
        let (name, db) = self.require_database()?;
        let summary = json!({
            "name": name,
            "path": db.path().display().to_string(),
            "page_size": db.page_size(),
            "page_count": db.page_count(),
            "nodes": db.node_count(),
            "edges": db.edge_count(),
            "labels": db.labels(),
        });
        Ok(Response::success(format!("database {name}"), Some(summary)))
    }

    /// Recreates the current database file from scratch.
    fn clear_database(&mut self) -> Result<Response> {
        let Some((name, db)) = self.current.take() else {
            return Ok(Response::error("no database selected; run USE <name>"));
        };
        let path = db.path().to_path_buf();
        db.close()?;
        fs::remove_file(&path)?;
        let db = KiteDB::open_with_config(&path, self.config.clone())?;
        self.current = Some((name.clone(), db));
        Ok(Response::success(format!("cleared database {name}"), None))
    }

    fn run_query(&mut self, text: &str) -> Result<Response> {
        let (_, db) = self.require_database()?;
        let rows = db.execute_query(text)?;
        Ok(Response::success(
            format!("{} row(s)", rows.len()),
            Some(serde_json::to_value(rows).expect("rows serialize")),
        ))
    }

    fn require_database(&mut self) -> Result<(&str, &mut KiteDB)> {
        self.current
            .as_mut()
            .map(|(name, db)| (name.as_str(), db))
            .ok_or_else(|| {
                kitedb::GraphError::InvalidArgument(
                    "no database selected; run USE <name>".into(),
                )
            })
    }

    fn close(mut self) -> Result<()> {
        if let Some((_, db)) = self.current.take() {
            db.close()?;
        }
        Ok(())
    }
}

/// Matches a leading admin verb case-insensitively and returns the argument
/// with its original casing.
fn strip_verb(upper: &str, original: &str, verb: &str) -> Option<String> {
    let rest = upper.strip_prefix(verb)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let arg = original[verb.len()..].trim();
    (!arg.is_empty() && !arg.contains(char::is_whitespace)).then(|| arg.to_string())
}

const HELP: &str = r#"
Meta commands:
  .help                   show this help
  .exit                   leave the shell

Admin commands:
  CREATE DATABASE <name>  create a new database file
  DROP DATABASE <name>    delete a database file
  USE <name>              select a database
  SHOW DATABASES          list database files
  SHOW NODES              list active nodes in the selected database
  SHOW EDGES              list active edges in the selected database
  DESCRIBE DATABASE       summarize the selected database
  CLEAR DATABASE          recreate the selected database empty

Anything else is executed as a query, e.g.
  CREATE (a:Person {name: "Alice", age: 30})
  MATCH (n:Person) WHERE n.name = "Alice" RETURN n
"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut shell = Shell::new(args);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let prompt = match &shell.current {
            Some((name, _)) => format!("kitedb:{name}> "),
            None => "kitedb> ".to_string(),
        };
        print!("{prompt}");
        let _ = io::stdout().flush();

        let Some(line) = lines.next() else { break };
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("failed to read input: {err}");
                break;
            }
        };

        let exiting = line.trim() == ".exit";
        if let Some(response) = shell.dispatch(&line) {
            response.print();
        }
        if exiting {
            break;
        }
    }

    if let Err(err) = shell.close() {
        eprintln!("failed to close database: {err}");
        process::exit(1);
    }
}
