//! arclite - CLI Client

use std::env;
use std::fs;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use arclite::{
    is_complete, AccessMode, Connection, ConnectionConfig, Row, Value, MEMORY_LOCATOR,
};

/// How query results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Table,
    Json,
}

/// Command-line options
struct Options {
    locator: String,
    read_only: bool,
    mode: OutputMode,
}

impl Options {
    fn parse() -> Self {
        let mut options = Self {
            locator: MEMORY_LOCATOR.to_string(),
            read_only: false,
            mode: OutputMode::Table,
        };

        // Simple argument parsing
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--readonly" => options.read_only = true,
                "--json" => options.mode = OutputMode::Json,
                _ => options.locator = arg,
            }
        }
        options
    }
}

/// Print welcome banner
fn print_banner(locator: &str) {
    println!(
        r#"
                 _ _ _
   __ _ _ __ ___| (_) |_ ___
  / _` | '__/ __| | | __/ _ \
 | (_| | | | (__| | | ||  __/
  \__,_|_|  \___|_|_|\__\___|

 Connected to {}
 Type '.help' for help, '.quit' to exit
"#,
        locator
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .quit              Exit arclite
  .mode table|json   Set the result format
  .functions         List functions registered by this shell
  .read <file>       Run every statement in a file

SQL statements run once they end with ';'.

Built-in functions:
  regexp(pattern, text)   1 if text contains pattern (used by REGEXP)
  median(x)               Median of a column

Examples:
  CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
  INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob');
  SELECT * FROM users WHERE name REGEXP 'li';
"#
    );
}

/// Format query results as a table
fn format_results(columns: &[String], rows: &[Vec<Value>]) -> String {
    if columns.is_empty() && rows.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    // Calculate column widths
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();

    // Header separator
    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    // Header
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    // Rows
    for row in &cells {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    output.push_str(&separator);
    output.push_str(&format!(
        "{} row{}\n",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    ));

    output
}

/// Format query results as a JSON document
fn format_json(columns: &[String], rows: &[Vec<Value>]) -> String {
    let document = serde_json::json!({
        "columns": columns,
        "rows": rows,
    });
    serde_json::to_string_pretty(&document).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Split `input` into complete statements; the unfinished tail is returned last
fn split_statements(input: &str) -> (Vec<&str>, &str) {
    let mut statements = Vec::new();
    let mut start = 0;
    for (i, _) in input.match_indices(';') {
        let candidate = &input[start..=i];
        if is_complete(candidate) {
            statements.push(candidate);
            start = i + 1;
        }
    }
    (statements, &input[start..])
}

/// Copy a row for display; text that is not valid UTF-8 is shown lossily
fn display_values(row: &Row<'_>) -> arclite::Result<Vec<Value>> {
    (0..row.column_count())
        .map(|i| row.value_ref(i).map(|v| v.to_owned_lossy()))
        .collect()
}

/// Register the functions the shell offers on every connection
fn register_builtins(conn: &Connection) -> arclite::Result<()> {
    conn.create_scalar(
        "regexp",
        |pattern: String, text: Option<String>| text.map(|t| t.contains(&pattern)),
        arclite::FunctionFlags::default(),
    )?;
    conn.create_aggregate("median", Median::default, arclite::FunctionFlags::default())?;
    Ok(())
}

/// Median of the non-NULL inputs of a group
#[derive(Default)]
struct Median {
    values: Vec<f64>,
}

impl arclite::Aggregate for Median {
    type Args = (Option<f64>,);
    type Output = Option<f64>;

    fn step(&mut self, (value,): Self::Args) -> Result<(), arclite::FunctionError> {
        self.values.extend(value);
        Ok(())
    }

    fn finalize(&mut self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        self.values.sort_by(f64::total_cmp);
        let mid = self.values.len() / 2;
        if self.values.len() % 2 == 0 {
            Some((self.values[mid - 1] + self.values[mid]) / 2.0)
        } else {
            Some(self.values[mid])
        }
    }

    fn reset(&mut self) -> bool {
        self.values.clear();
        true
    }
}

/// Interactive session over one connection
struct Shell {
    conn: Connection,
    mode: OutputMode,
}

impl Shell {
    /// Execute one SQL statement and print its rows
    fn execute_sql(&self, sql: &str) {
        let mut cursor = self.conn.cursor();
        let mut rows = match cursor.execute(sql, ()) {
            Ok(rows) => rows,
            Err(e) => {
                eprintln!("Error: {}", e);
                return;
            }
        };

        let columns = rows.column_names();
        let mut values = Vec::new();
        loop {
            match rows.next() {
                Ok(Some(row)) => match display_values(&row) {
                    Ok(row) => values.push(row),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return;
                }
            }
        }

        if columns.is_empty() {
            let changes = self.conn.changes();
            if changes > 0 {
                println!("{} row(s) affected", changes);
            }
            return;
        }

        match self.mode {
            OutputMode::Table => print!("{}", format_results(&columns, &values)),
            OutputMode::Json => println!("{}", format_json(&columns, &values)),
        }
    }

    /// Handle special dot commands; returns false when the shell should exit
    fn handle_special_command(&mut self, cmd: &str) -> bool {
        let parts: Vec<&str> = cmd.split_whitespace().collect();

        match parts.first().copied() {
            Some(".help") => print_help(),
            Some(".quit") | Some(".exit") => return false,
            Some(".mode") => match parts.get(1).copied() {
                Some("table") => self.mode = OutputMode::Table,
                Some("json") => self.mode = OutputMode::Json,
                Some(other) => eprintln!("Unknown mode: {}", other),
                None => println!("{:?}", self.mode),
            },
            Some(".functions") => {
                let functions = self.conn.functions();
                match self.mode {
                    OutputMode::Json => match serde_json::to_string_pretty(&functions) {
                        Ok(json) => println!("{}", json),
                        Err(e) => eprintln!("Error: {}", e),
                    },
                    OutputMode::Table => {
                        for info in functions {
                            println!(
                                "  {}/{} ({:?}, {:?})",
                                info.name, info.arity, info.kind, info.flags
                            );
                        }
                    }
                }
            }
            Some(".read") => match parts.get(1) {
                Some(path) => {
                    let script = fs::read_to_string(path)
                        .with_context(|| format!("cannot read {}", path))
                        .and_then(|sql| self.conn.executescript(&sql).map_err(Into::into));
                    if let Err(e) = script {
                        eprintln!("Error: {:#}", e);
                    }
                }
                None => eprintln!("Usage: .read <file>"),
            },
            Some(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("Type '.help' for available commands.");
            }
            None => {}
        }
        true
    }

    /// Main REPL loop
    fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        let mut input_buffer = String::new();

        loop {
            let prompt = if input_buffer.is_empty() {
                "arclite> "
            } else {
                "   ...> "
            };

            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    input_buffer.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            editor.add_history_entry(trimmed)?;

            // Handle special commands
            if input_buffer.is_empty() && trimmed.starts_with('.') {
                if !self.handle_special_command(trimmed) {
                    break;
                }
                continue;
            }

            // Accumulate input
            input_buffer.push_str(&line);
            input_buffer.push('\n');

            let (statements, rest) = split_statements(&input_buffer);
            for sql in &statements {
                self.execute_sql(sql);
            }
            input_buffer = if rest.trim().is_empty() {
                String::new()
            } else {
                rest.to_string()
            };
        }

        println!("Goodbye!");
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::parse();
    let mode = if options.read_only {
        AccessMode::ReadOnly
    } else {
        AccessMode::Create
    };
    let config = ConnectionConfig::new().mode(mode);
    let conn = Connection::open_with_config(&options.locator, &config)
        .with_context(|| format!("cannot open {}", options.locator))?;
    register_builtins(&conn)?;

    print_banner(conn.locator());

    let mut shell = Shell {
        conn,
        mode: options.mode,
    };
    shell.run()
}
