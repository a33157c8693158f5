use super::{AssetDecoder, AssetError, AssetSource, DecodedAsset};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Handle for a started load. Tokens increase with every call to `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub token: u64,
    pub source_name: String,
}

#[derive(Debug)]
pub struct LoadCompletion {
    pub token: u64,
    pub source_name: String,
    pub result: Result<DecodedAsset, AssetError>,
}

/// Decodes assets on worker threads and hands results back through a channel.
///
/// A started load always runs to completion; superseding it is the caller's job.
pub struct AssetLoader {
    decoder: Arc<dyn AssetDecoder>,
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
    next_token: u64,
    in_flight: usize,
}

impl AssetLoader {
    pub fn new(decoder: Arc<dyn AssetDecoder>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            decoder,
            sender,
            receiver,
            next_token: 0,
            in_flight: 0,
        }
    }

    pub fn load(&mut self, source: AssetSource) -> LoadTicket {
        self.next_token += 1;
        let token = self.next_token;
        let source_name = source.display_name();
        self.in_flight += 1;
        log::info!("Loading '{}' (request {})", source_name, token);

        let decoder = Arc::clone(&self.decoder);
        let sender = self.sender.clone();
        let worker_name = source_name.clone();
        let spawned = thread::Builder::new()
            .name(format!("asset-load-{token}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&source)))
                    .unwrap_or_else(|_| {
                        Err(AssetError::WorkerPanicked {
                            name: worker_name.clone(),
                        })
                    });
                let completion = LoadCompletion {
                    token,
                    source_name: worker_name,
                    result,
                };
                if sender.send(completion).is_err() {
                    log::debug!("Loader dropped before request {} finished", token);
                }
            });

        if let Err(err) = spawned {
            log::error!("Failed to spawn load worker for '{}': {}", source_name, err);
            let _ = self.sender.send(LoadCompletion {
                token,
                source_name: source_name.clone(),
                result: Err(AssetError::WorkerSpawn(err)),
            });
        }

        LoadTicket { token, source_name }
    }

    /// Completed loads in arrival order, without blocking.
    pub fn poll(&mut self) -> Vec<LoadCompletion> {
        let mut completed = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    completed.push(completion);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        completed
    }

    /// Blocks up to `timeout` for the next completion.
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadCompletion> {
        match self.receiver.recv_timeout(timeout) {
            Ok(completion) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(completion)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn latest_token(&self) -> u64 {
        self.next_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::ScriptedDecoder;

    const WAIT: Duration = Duration::from_secs(5);

    struct PanickingDecoder;

    impl AssetDecoder for PanickingDecoder {
        fn decode(&self, _source: &AssetSource) -> Result<DecodedAsset, AssetError> {
            panic!("decoder exploded");
        }
    }

    #[test]
    fn tokens_increase_per_load() {
        let mut loader = AssetLoader::new(Arc::new(ScriptedDecoder::new()));
        let first = loader.load(AssetSource::bytes("a.glb", b"cube".to_vec()));
        let second = loader.load(AssetSource::bytes("b.glb", b"cube".to_vec()));
        assert!(second.token > first.token);
        assert_eq!(loader.latest_token(), second.token);
        assert!(loader.wait(WAIT).is_some());
        assert!(loader.wait(WAIT).is_some());
        assert_eq!(loader.in_flight(), 0);
    }

    #[test]
    fn decode_failure_is_delivered_as_completion() {
        let mut loader = AssetLoader::new(Arc::new(ScriptedDecoder::new()));
        let ticket = loader.load(AssetSource::bytes("broken.glb", b"garbage".to_vec()));
        let completion = loader.wait(WAIT).expect("completion");
        assert_eq!(completion.token, ticket.token);
        assert!(matches!(completion.result, Err(AssetError::Decode { .. })));
    }

    #[test]
    fn worker_panic_becomes_error() {
        let mut loader = AssetLoader::new(Arc::new(PanickingDecoder));
        loader.load(AssetSource::bytes("boom.glb", b"cube".to_vec()));
        let completion = loader.wait(WAIT).expect("completion");
        assert!(matches!(
            completion.result,
            Err(AssetError::WorkerPanicked { .. })
        ));
    }

    #[test]
    fn completions_arrive_in_finish_order() {
        let decoder = Arc::new(ScriptedDecoder::new());
        let release_slow = decoder.gate("slow.glb");
        let mut loader = AssetLoader::new(decoder);
        let slow = loader.load(AssetSource::bytes("slow.glb", b"cube".to_vec()));
        let fast = loader.load(AssetSource::bytes("fast.glb", b"cube".to_vec()));

        let first = loader.wait(WAIT).expect("fast completion");
        assert_eq!(first.token, fast.token);
        assert!(loader.poll().is_empty());

        release_slow.send(()).unwrap();
        let second = loader.wait(WAIT).expect("slow completion");
        assert_eq!(second.token, slow.token);
    }
}
