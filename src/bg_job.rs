use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fire-and-forget jobs run on a small set of worker threads. Jobs are never
/// cancelled; the workers exit once the queue is dropped and drained.
#[derive(Debug)]
pub(crate) struct JobQueue {
    send: mpsc::Sender<Job>,
}

impl JobQueue {
    pub(crate) fn new(name: &str, pool_size: usize) -> Self {
        let (send, recv) = mpsc::channel();
        let recv = Arc::new(Mutex::new(recv));
        for i in 0..pool_size.max(1) {
            Self::spawn_bg_thread(format!("{name}-{i}"), recv.clone());
        }
        JobQueue { send }
    }

    pub(crate) fn execute(&self, job: Job) {
        if self.send.send(job).is_err() {
            log::warn!("background workers are gone, dropping job");
        }
    }

    fn spawn_bg_thread(name: String, recv: Arc<Mutex<Receiver<Job>>>) {
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || loop {
            let job = {
                let Ok(recv) = recv.lock() else {
                    return;
                };
                match recv.recv() {
                    Ok(job) => job,
                    Err(_) => return,
                }
            };

            job();
        });

        if let Err(err) = spawned {
            log::error!("failed to spawn background worker {name}: {err}");
        }
    }
}

/// Runs `job` once on its own named thread.
pub(crate) fn spawn_once(
    name: &str,
    job: impl FnOnce() + Send + 'static,
) -> Option<thread::JoinHandle<()>> {
    match thread::Builder::new().name(name.to_string()).spawn(job) {
        Ok(handle) => Some(handle),
        Err(err) => {
            log::error!("failed to spawn {name}: {err}");
            None
        }
    }
}
