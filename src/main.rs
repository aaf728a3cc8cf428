use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use easy_track::app::{HunkBatch, ReviewError, ReviewState};
use easy_track::config::{self, BaselineSource, EtConfig, ReviewMode};
use easy_track::diff::{self, ChangeKind, ChangeRecord};
use easy_track::git::{self, GitCli};
use easy_track::hunk::{self, BufferEditor, DocumentEditor, FileEditor, Hunk, HunkId};
use easy_track::watch::{DocumentReader, FileWatcher, FsReader, Pipeline, RawEvent};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// How long the loop blocks when no debounce is pending
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// Track and review the changes other tools make to your files
#[derive(Parser)]
#[command(name = "et", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch files and review changes as they land (commands on stdin)
    Watch {
        /// Files or glob patterns (defaults to [watch] paths from config)
        paths: Vec<String>,

        /// Print batches and results as JSON lines
        #[arg(long)]
        json: bool,

        /// live: the file already has the change; preview: the file keeps the baseline
        #[arg(long, value_enum)]
        mode: Option<ReviewMode>,

        /// What each pass diffs against
        #[arg(long, value_enum)]
        baseline: Option<BaselineSource>,

        /// Quiet period before a change is processed
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Print the change records between two files
    Diff {
        old: PathBuf,
        new: PathBuf,

        #[arg(long)]
        json: bool,

        /// Also show word-level changes inside changed lines
        #[arg(long)]
        words: bool,
    },

    /// Classify the change from <previous> to the current content of <path>
    Classify { path: PathBuf, previous: PathBuf },

    /// Print the effective config, or save it
    Config {
        /// Write the effective config to the global config file
        #[arg(long)]
        save: bool,

        /// With --save, write the repo-local .et-config.toml instead
        #[arg(long, requires = "save")]
        local: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Watch {
            paths,
            json,
            mode,
            baseline,
            debounce_ms,
        } => {
            let mut config = load_config()?;
            if let Some(mode) = mode {
                config.review.mode = mode;
            }
            if let Some(baseline) = baseline {
                config.review.baseline = baseline;
            }
            if let Some(ms) = debounce_ms {
                config.watch.debounce_ms = ms;
            }
            let patterns = if paths.is_empty() {
                config.watch.paths.clone()
            } else {
                paths
            };
            let files = expand_paths(&patterns)?;
            if files.is_empty() {
                anyhow::bail!("Nothing to watch: pass files or set [watch] paths in config");
            }
            run_watch(config, files, json)
        }
        Command::Diff {
            old,
            new,
            json,
            words,
        } => run_diff(&old, &new, json, words),
        Command::Classify { path, previous } => run_classify(&path, &previous),
        Command::Config { save, local } => run_config(save, local),
    }
}

fn config_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(git::get_repo_root_in(&cwd).unwrap_or(cwd))
}

fn load_config() -> Result<EtConfig> {
    Ok(config::load_config(&config_root()?))
}

fn run_config(save: bool, local: bool) -> Result<()> {
    let config = load_config()?;
    if !save {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }
    let path = if local {
        let path = config::local_config_path(&config_root()?);
        config::save_config_to(&path, &config)?;
        path
    } else {
        config::save_config(&config)?
    };
    println!("Saved {}", path.display());
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<String>> {
    FsReader
        .read(path)
        .with_context(|| format!("Cannot read {}", path.display()))
}

/// Expand glob patterns; plain paths pass through even if the file does not exist yet.
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if !pattern.contains(|c: char| matches!(c, '*' | '?' | '[')) {
            files.push(PathBuf::from(pattern));
            continue;
        }
        let matches =
            glob::glob(pattern).with_context(|| format!("Invalid glob pattern '{}'", pattern))?;
        for entry in matches {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping {}: {}", e.path().display(), e),
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

// ── Watch session ──

#[derive(Debug)]
enum Input {
    Raw(RawEvent),
    Line(String),
    /// Command input ended; the session stops
    Closed,
}

impl From<RawEvent> for Input {
    fn from(event: RawEvent) -> Self {
        Input::Raw(event)
    }
}

/// Where review decisions land
enum Documents {
    /// Live mode: decisions edit the files in place
    Files(FileEditor),
    /// Preview mode: the reviewed copy lives in memory until `write`
    Buffers(BufferEditor),
}

impl Documents {
    fn editor(&mut self) -> &mut dyn DocumentEditor {
        match self {
            Documents::Files(files) => files,
            Documents::Buffers(buffers) => buffers,
        }
    }

    fn reset(&mut self, path: &Path, lines: Vec<String>) {
        if let Documents::Buffers(buffers) = self {
            buffers.insert(path, lines);
        }
    }

    /// Persist the reviewed content and return what the file now holds.
    fn write(&mut self, path: &Path) -> Result<Vec<String>> {
        match self {
            Documents::Files(_) => read_file(path),
            Documents::Buffers(buffers) => {
                let lines = buffers
                    .lines(path)
                    .with_context(|| format!("No buffer for {}", path.display()))?
                    .to_vec();
                let mut text = lines.join("\n");
                if !lines.is_empty() {
                    text.push('\n');
                }
                std::fs::write(path, text)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(lines)
            }
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Session {
    state: ReviewState,
    pipeline: Pipeline<FsReader>,
    documents: Documents,
    json: bool,
}

fn run_watch(config: EtConfig, files: Vec<PathBuf>, json: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Input>();
    let mut watcher = FileWatcher::new(tx.clone())?;

    let documents = match config.review.mode {
        ReviewMode::Live => Documents::Files(FileEditor),
        ReviewMode::Preview => Documents::Buffers(BufferEditor::new()),
    };
    let mut session = Session {
        state: ReviewState::new(config.review.clone()),
        pipeline: Pipeline::from_config(FsReader, &config),
        documents,
        json,
    };

    for path in &files {
        watcher.watch(path)?;
        session.pipeline.start_watching(&mut session.state, path);
        let baseline = session
            .state
            .document(path)
            .map(|d| d.baseline.lines().to_vec())
            .unwrap_or_default();
        session.documents.reset(path, baseline);
        log::info!("watching {}", path.display());
    }
    eprintln!(
        "watching {} file(s), {:?} mode; type `help` for commands",
        files.len(),
        config.review.mode
    );

    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), &tx));

    loop {
        let timeout = session
            .pipeline
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        match rx.recv_timeout(timeout) {
            Ok(Input::Raw(event)) => session.pipeline.notify(&session.state, event, Instant::now()),
            Ok(Input::Line(line)) => match session.handle(&line) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("error: {:#}", e),
            },
            Ok(Input::Closed) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let json = session.json;
        let mut print = |batch: &HunkBatch| print_batch(batch, json);
        session
            .pipeline
            .poll(&mut session.state, Instant::now(), &mut print);
    }

    for path in &files {
        watcher.unwatch(path)?;
    }
    Ok(())
}

/// Send each command line to the loop, then `Input::Closed` once input ends.
/// The watcher holds its own sender, so the channel never disconnects on its own.
fn forward_lines(input: impl BufRead, tx: &mpsc::Sender<Input>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if tx.send(Input::Line(line)).is_err() {
            return;
        }
    }
    log::debug!("stdin closed");
    let _ = tx.send(Input::Closed);
}

impl Session {
    fn handle(&mut self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Flow::Continue);
        };
        let arg = words.next();

        let result = match command {
            "quit" | "q" => return Ok(Flow::Quit),
            "help" | "?" => {
                eprintln!(
                    "commands: list | accept <id> | reject <id> | accept-all [path] | \
                     reject-all [path] | undo [path] | snapshot [path] | write [path] | quit\n\
                     the session also ends when stdin closes"
                );
                Ok(())
            }
            "list" | "ls" => {
                self.list();
                Ok(())
            }
            "accept" | "a" => self.decide(arg, true),
            "reject" | "r" => self.decide(arg, false),
            "accept-all" => self.decide_all(arg, true),
            "reject-all" => self.decide_all(arg, false),
            "undo" | "u" => self.undo(arg),
            "snapshot" => self.snapshot(arg),
            "write" | "w" => self.write(arg),
            other => {
                eprintln!("unknown command '{}'", other);
                Ok(())
            }
        };

        match result {
            Ok(()) => Ok(Flow::Continue),
            Err(e) => match e.downcast_ref::<ReviewError>() {
                Some(review) if review.is_informational() => {
                    eprintln!("{}", review);
                    Ok(Flow::Continue)
                }
                _ => Err(e),
            },
        }
    }

    /// The watched path an argument names, or the only watched path.
    fn resolve(&self, arg: Option<&str>) -> Result<PathBuf> {
        let paths = self.state.paths();
        match arg {
            Some(name) => paths
                .iter()
                .find(|p| **p == Path::new(name) || p.ends_with(name))
                .map(|p| p.to_path_buf())
                .with_context(|| format!("Not watching '{}'", name)),
            None => match paths.as_slice() {
                [only] => Ok(only.to_path_buf()),
                _ => anyhow::bail!("Several files are watched; name one"),
            },
        }
    }

    fn targets(&self, arg: Option<&str>) -> Result<Vec<PathBuf>> {
        match arg {
            Some(_) => Ok(vec![self.resolve(arg)?]),
            None => Ok(self.state.paths().into_iter().map(Path::to_path_buf).collect()),
        }
    }

    fn list(&self) {
        for path in self.state.paths() {
            let hunks = self.state.hunks(path);
            if self.json {
                let entry = serde_json::json!({ "path": path, "hunks": hunks });
                println!("{}", entry);
                continue;
            }
            println!(
                "{} ({} pending)",
                path.display(),
                self.state.pending_count(path)
            );
            for hunk in hunks {
                print_hunk(hunk);
            }
        }
    }

    fn decide(&mut self, arg: Option<&str>, accept: bool) -> Result<()> {
        let id: HunkId = arg
            .context("Which hunk? Pass its id")?
            .trim_start_matches('#')
            .parse()
            .context("Hunk ids are numbers")?;
        let path = self
            .state
            .locate(id)
            .map(Path::to_path_buf)
            .ok_or(ReviewError::UnknownHunk(id))?;

        let editor = self.documents.editor();
        let decision = if accept {
            self.state.accept(&path, id, editor)?
        } else {
            self.state.reject(&path, id, editor)?
        };

        if self.json {
            println!("{}", serde_json::to_string(&decision)?);
        } else {
            let verb = if accept { "accepted" } else { "rejected" };
            let tail = if decision.resolved { ", batch resolved" } else { "" };
            println!("{} #{}{}", verb, id, tail);
        }
        Ok(())
    }

    fn decide_all(&mut self, arg: Option<&str>, accept: bool) -> Result<()> {
        let mut total = 0;
        for path in self.targets(arg)? {
            if self.state.pending_count(&path) == 0 {
                continue;
            }
            let editor = self.documents.editor();
            total += if accept {
                self.state.accept_all(&path, editor)?
            } else {
                self.state.reject_all(&path, editor)?
            };
        }
        if total == 0 {
            return Err(ReviewError::NoPendingHunk.into());
        }
        let verb = if accept { "accepted" } else { "rejected" };
        println!("{} {} hunk(s)", verb, total);
        Ok(())
    }

    fn undo(&mut self, arg: Option<&str>) -> Result<()> {
        let path = self.resolve(arg)?;
        let undone = self.state.undo(&path, self.documents.editor())?;
        if self.json {
            println!("{}", serde_json::to_string(&undone)?);
        } else {
            println!("undone: {:?}", undone);
        }
        Ok(())
    }

    fn snapshot(&mut self, arg: Option<&str>) -> Result<()> {
        for path in self.targets(arg)? {
            let lines = read_file(&path)?;
            self.documents.reset(&path, lines.clone());
            self.state.snapshot(&path, lines)?;
            println!("baseline of {} reset", path.display());
        }
        Ok(())
    }

    fn write(&mut self, arg: Option<&str>) -> Result<()> {
        for path in self.targets(arg)? {
            let lines = self.documents.write(&path)?;
            self.state.on_write(&path, lines)?;
            println!("wrote {}", path.display());
        }
        Ok(())
    }
}

// ── Output ──

fn print_hunk(hunk: &Hunk) {
    let range = hunk::range_of(hunk);
    println!(
        "  #{} {:?} {} line {}-{} {}",
        hunk.id,
        hunk.status,
        hunk.kind().symbol(),
        range.start(),
        range.end(),
        hunk.change.header()
    );
}

fn print_batch(batch: &HunkBatch, json: bool) {
    if json {
        match serde_json::to_string(batch) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("Cannot serialize batch: {}", e),
        }
        return;
    }
    let origin = batch.origin.map(|o| o.label()).unwrap_or("-");
    println!(
        "{}: {:?} ({} hunk(s), origin {})",
        batch.path.display(),
        batch.reason,
        batch.hunks.len(),
        origin
    );
    for hunk in &batch.hunks {
        print_hunk(hunk);
        print_record_lines(&hunk.change);
    }
}

fn print_record_lines(record: &ChangeRecord) {
    for line in &record.old_lines {
        println!("    -{}", line);
    }
    for line in &record.new_lines {
        println!("    +{}", line);
    }
}

// ── One-shot commands ──

fn run_diff(old: &Path, new: &Path, json: bool, words: bool) -> Result<()> {
    let old_lines = read_file(old)?;
    let new_lines = read_file(new)?;
    let records = diff::compute(&old_lines, &new_lines);

    if json {
        if words {
            let entries: Vec<_> = records
                .iter()
                .map(|r| serde_json::json!({ "record": r, "words": word_changes(r) }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        return Ok(());
    }

    for record in &records {
        println!("{}", record.header());
        print_record_lines(record);
        if words {
            for (i, changes) in word_changes(record).iter().enumerate() {
                for change in changes {
                    println!(
                        "    line {}: {} old {:?} new {:?}",
                        record.new_start + i,
                        change.kind.symbol(),
                        change.old,
                        change.new
                    );
                }
            }
        }
    }
    Ok(())
}

/// Word changes for each old/new line pair of a `Change` record
fn word_changes(record: &ChangeRecord) -> Vec<Vec<diff::WordChange>> {
    if record.kind != ChangeKind::Change {
        return Vec::new();
    }
    record
        .old_lines
        .iter()
        .zip(&record.new_lines)
        .map(|(old, new)| diff::compute_words(old, new))
        .collect()
}

fn run_classify(path: &Path, previous: &Path) -> Result<()> {
    let current = read_file(path)?;
    let before = read_file(previous)?;
    let origin = git::classify(&mut GitCli, path, &before, &current);
    println!("{}", origin.label());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_stdin_ends_the_session() {
        let (tx, rx) = mpsc::channel::<Input>();
        let _watcher_sender = tx.clone();
        forward_lines(std::io::Cursor::new("list\nundo doc.txt\n"), &tx);

        let received: Vec<Input> = rx.try_iter().collect();
        assert!(matches!(&received[0], Input::Line(l) if l == "list"));
        assert!(matches!(&received[1], Input::Line(l) if l == "undo doc.txt"));
        assert!(matches!(received[2], Input::Closed));
        assert_eq!(received.len(), 3);
    }
}
