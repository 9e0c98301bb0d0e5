#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pelican_slideshow::error::SourceError;
use pelican_slideshow::photo::{Photo, PhotoUrls, PhotoUser};
use pelican_slideshow::source::ImageSource;
use tokio::sync::{Mutex, mpsc};

pub type Script = mpsc::UnboundedSender<Result<Photo, SourceError>>;

/// Image source whose answers are fed in by the test. A fetch stays pending
/// until the test pushes the next response, which lets tests observe the
/// loading state.
pub struct ScriptedSource {
    responses: Mutex<mpsc::UnboundedReceiver<Result<Photo, SourceError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> (Arc<Self>, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            responses: Mutex::new(rx),
            calls: AtomicUsize::new(0),
        };
        (Arc::new(source), tx)
    }

    /// Number of fetches the session has started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageSource for ScriptedSource {
    async fn fetch_one(&self) -> Result<Photo, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().await;
        responses
            .recv()
            .await
            .unwrap_or_else(|| Err(SourceError::Unexpected("script exhausted".into())))
    }
}

pub fn photo(id: &str) -> Photo {
    let base = format!("https://images.unsplash.com/{id}");
    Photo {
        id: id.to_owned(),
        alt_description: Some(format!("pelican {id}")),
        description: None,
        urls: PhotoUrls {
            raw: format!("{base}?raw"),
            full: format!("{base}?full"),
            regular: format!("{base}?regular"),
            small: format!("{base}?small"),
            thumb: format!("{base}?thumb"),
        },
        user: PhotoUser {
            id: "user-1".into(),
            username: "photographer123".into(),
            name: "John Photographer".into(),
        },
        width: 4000,
        height: 3000,
    }
}
