//! Interactive REPL for the catalog shell.

use std::io::{self, BufRead, Write};

use super::session::{Session, ShellOutput, ShellResult};
use crate::sql::Statement;

/// REPL configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    pub prompt: String,
    /// Show timing information.
    pub timing: bool,
    /// Max rows to display.
    pub max_rows: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "gitcat> ".into(),
            timing: false,
            max_rows: 100,
        }
    }
}

pub struct Repl {
    session: Session,
    config: ReplConfig,
    history: Vec<String>,
}

impl Repl {
    pub fn new(session: Session) -> Self {
        Self::with_config(session, ReplConfig::default())
    }

    pub fn with_config(session: Session, config: ReplConfig) -> Self {
        Self {
            session,
            config,
            history: Vec::new(),
        }
    }

    /// Run the REPL until EOF or `.quit`.
    pub fn run(&mut self) -> ShellResult<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut input = String::new();
        let mut multiline = false;

        loop {
            let prompt = if multiline { "     -> " } else { self.config.prompt.as_str() };
            print!("{}", prompt);
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!();
                break;
            }

            let line = line.trim_end();
            if line.is_empty() && !multiline {
                continue;
            }

            if multiline {
                input.push(' ');
            }
            input.push_str(line);

            // statements run once terminated by a semicolon
            if !input.ends_with(';') && !is_command(&input) {
                multiline = true;
                continue;
            }
            multiline = false;

            let cmd = input.trim().to_string();
            input.clear();
            if cmd.is_empty() {
                continue;
            }
            self.history.push(cmd.clone());

            if is_command(&cmd) {
                if self.handle_command(&cmd) {
                    break;
                }
                continue;
            }

            let start = std::time::Instant::now();
            match self.session.execute(&cmd) {
                Ok(output) => {
                    print!("{}", render(&output, self.config.max_rows));
                    if self.config.timing {
                        println!("Time: {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        println!("gitcat {} - versioned table catalog", env!("CARGO_PKG_VERSION"));
        println!("Type .help for commands, or enter statements ending with ';'");
        println!();
    }

    /// Returns true when the REPL should exit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        let cmd = cmd.trim_start_matches(&['.', '\\'][..]);
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        let command = parts.first().map(|s| s.to_lowercase());

        let statement = match command.as_deref() {
            Some("help") | Some("h") | Some("?") => {
                print_help();
                return false;
            }
            Some("quit") | Some("exit") | Some("q") => return true,
            Some("schemas") | Some("dn") => Statement::ShowSchemas,
            Some("tables") | Some("dt") => Statement::ShowTables {
                schema: parts.get(1).map(|s| s.to_string()),
            },
            Some("branch") => Statement::ShowBranch,
            Some("describe") | Some("d") => match parts.get(1) {
                Some(table) => match crate::model::SchemaTableName::parse(table) {
                    Some(name) => Statement::Describe(name),
                    None => {
                        eprintln!("Usage: .describe <schema.table>");
                        return false;
                    }
                },
                None => {
                    eprintln!("Usage: .describe <schema.table>");
                    return false;
                }
            },
            Some("history") => {
                for (i, cmd) in self.history.iter().enumerate() {
                    println!("  {}: {}", i + 1, cmd);
                }
                return false;
            }
            Some("timing") => {
                self.config.timing = !self.config.timing;
                println!("Timing: {}", if self.config.timing { "on" } else { "off" });
                return false;
            }
            Some(other) => {
                eprintln!("Unknown command: .{}", other);
                eprintln!("Type .help for available commands");
                return false;
            }
            None => return false,
        };

        match self.session.execute_statement(statement) {
            Ok(output) => print!("{}", render(&output, self.config.max_rows)),
            Err(e) => eprintln!("Error: {}", e),
        }
        false
    }
}

fn is_command(input: &str) -> bool {
    input.starts_with('.') || input.starts_with('\\')
}

fn print_help() {
    println!("Commands:");
    println!("  .help, .h, .?           Show this help message");
    println!("  .quit, .exit, .q        Exit the REPL");
    println!("  .schemas, .dn           List schemas");
    println!("  .tables [schema], .dt   List tables");
    println!("  .describe <s.t>, .d     Show table columns");
    println!("  .branch                 Show the current reference");
    println!("  .history                Show command history");
    println!("  .timing                 Toggle timing display");
    println!();
    println!("Statements:");
    println!("  SHOW SCHEMAS | SHOW TABLES [FROM s] | SHOW BRANCH");
    println!("  CREATE SCHEMA [IF NOT EXISTS] s");
    println!("  DROP SCHEMA [IF EXISTS] s");
    println!("  CREATE TABLE [IF NOT EXISTS] s.t (col TYPE [NOT NULL] [COMMENT '...'], ...)");
    println!("  DROP TABLE [IF EXISTS] s.t");
    println!("  ALTER TABLE s.t RENAME TO s.u");
    println!("  DESCRIBE s.t");
    println!();
}

/// Format statement output for the terminal.
pub fn render(output: &ShellOutput, max_rows: usize) -> String {
    match output {
        ShellOutput::Message(message) => format!("{}\n", message),
        ShellOutput::Rows { header, rows } => render_rows(header, rows, max_rows),
    }
}

fn render_rows(header: &[String], rows: &[Vec<String>], max_rows: usize) -> String {
    if rows.is_empty() {
        return "(0 rows)\n".to_string();
    }

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, value) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(value.len());
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(header));
    out.push('\n');
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&sep.join("-+-"));
    out.push('\n');

    let limit = rows.len().min(max_rows);
    for row in rows.iter().take(limit) {
        out.push_str(&line(row));
        out.push('\n');
    }
    if rows.len() > limit {
        out.push_str(&format!("... ({} more rows)\n", rows.len() - limit));
    }
    out.push_str(&format!("({} rows)\n", rows.len()));
    out
}
