//! In-process mock workspace for unit tests.

use crate::http::DatabricksHttp;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
};
use magpie_auth::StaticToken;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub(crate) struct Mock {
    pub url: String,
    /// `"<METHOD> <path?query>"` for every request received.
    pub hits: Arc<Mutex<Vec<String>>>,
}

impl Mock {
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.hits().iter().filter(|h| h.contains(needle)).count()
    }
}

pub(crate) async fn serve(router: Router) -> Mock {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let recorder = hits.clone();
    let app = router.layer(middleware::from_fn(move |req: Request, next: Next| {
        let recorder = recorder.clone();
        async move {
            recorder
                .lock()
                .unwrap()
                .push(format!("{} {}", req.method(), req.uri()));
            next.run(req).await
        }
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Mock {
        url: format!("http://{addr}"),
        hits,
    }
}

pub(crate) fn http(url: &str) -> DatabricksHttp {
    DatabricksHttp::new(
        url,
        Arc::new(StaticToken::new("test-token").unwrap()),
        Duration::from_secs(5),
    )
}
