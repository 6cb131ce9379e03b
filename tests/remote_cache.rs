use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use showreel::cache::{CommandRunner, RemoteCache, RemoteCommand};
use showreel::error::ShowreelResult;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "showreel_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Records every command and materializes `get` destinations on disk, so
/// cache-hit behavior can be observed without a real transfer tool.
#[derive(Clone)]
struct RecordingRunner {
    commands: Arc<Mutex<Vec<RemoteCommand>>>,
}

impl RecordingRunner {
    fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn recorded(&self) -> Vec<RemoteCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, command: &RemoteCommand) -> ShowreelResult<i32> {
        if command.args.first().map(String::as_str) == Some("get") {
            let dest = &command.args[2];
            std::fs::write(dest, b"fetched").unwrap();
        }
        self.commands.lock().unwrap().push(command.clone());
        Ok(0)
    }
}

#[test]
fn remote_file_is_fetched_once() {
    let cache_dir = temp_dir("cache_once");
    let runner = RecordingRunner::new();
    let mut cache = RemoteCache::new(&cache_dir).with_runner(Box::new(runner.clone()));

    let remote = "manifold://bucket/assets/model.glb";
    let first = cache.download_if_remote(remote).unwrap();
    let second = cache.download_if_remote(remote).unwrap();

    assert_eq!(first, second);
    assert!(first.starts_with(&cache_dir));
    assert_eq!(std::fs::read(&first).unwrap(), b"fetched");

    let commands = runner.recorded();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].program, "manifold");
    assert_eq!(commands[0].args[0], "get");
    assert_eq!(commands[0].args[1], "bucket/assets/model.glb");
    assert_eq!(commands[0].args.last().map(String::as_str), Some("--overwrite"));

    std::fs::remove_dir_all(&cache_dir).ok();
}

#[test]
fn local_paths_pass_through_without_commands() {
    let cache_dir = temp_dir("cache_local");
    let runner = RecordingRunner::new();
    let mut cache = RemoteCache::new(&cache_dir).with_runner(Box::new(runner.clone()));

    let resolved = cache.download_if_remote("/plain/local/file.glb").unwrap();
    assert_eq!(resolved, PathBuf::from("/plain/local/file.glb"));
    assert!(runner.recorded().is_empty());
}

#[test]
fn upload_happens_after_the_closure_and_from_its_staging_dir() {
    let cache_dir = temp_dir("cache_upload");
    let runner = RecordingRunner::new();
    let mut cache = RemoteCache::new(&cache_dir).with_runner(Box::new(runner.clone()));

    let remote = "manifold://bucket/outputs/job1";
    let staged_file = cache
        .with_upload(remote, |staging| {
            std::fs::write(staging.join("result.txt"), b"done").unwrap();
            Ok(staging.join("result.txt"))
        })
        .unwrap();

    // The closure ran against the deterministic staging dir for this remote.
    assert_eq!(staged_file.parent().unwrap(), cache.staging_dir(remote));
    assert!(staged_file.is_file());

    let commands = runner.recorded();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].args[0], "putr");
    assert_eq!(
        commands[0].args[1],
        cache.staging_dir(remote).display().to_string()
    );
    assert_eq!(commands[0].args[2], "bucket/outputs/job1");

    std::fs::remove_dir_all(&cache_dir).ok();
}

#[test]
fn failed_closure_uploads_nothing() {
    let cache_dir = temp_dir("cache_failed");
    let runner = RecordingRunner::new();
    let mut cache = RemoteCache::new(&cache_dir).with_runner(Box::new(runner.clone()));

    let result: ShowreelResult<()> = cache.with_upload("manifold://bucket/outputs/job2", |_| {
        Err(showreel::ShowreelError::validation("job blew up"))
    });

    assert!(result.is_err());
    assert!(runner.recorded().is_empty());

    std::fs::remove_dir_all(&cache_dir).ok();
}
