/// Scripted fetcher for tests.
///
/// Routes are matched in registration order; the first route whose predicate
/// accepts the request and still has responses left answers it. Every
/// request is logged so tests can assert on what was sent.
use std::cell::RefCell;

use super::{FetchRequest, FetchResponse, Fetcher, TransportError};

type Predicate = Box<dyn Fn(&FetchRequest) -> bool>;

struct Route {
    predicate: Predicate,
    response: Result<FetchResponse, TransportError>,
    /// `None` answers forever.
    remaining: Option<usize>,
}

#[derive(Default)]
pub struct MockFetcher {
    routes: RefCell<Vec<Route>>,
    log: RefCell<Vec<FetchRequest>>,
}

impl MockFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &self,
        predicate: impl Fn(&FetchRequest) -> bool + 'static,
        response: Result<FetchResponse, TransportError>,
        remaining: Option<usize>,
    ) -> &Self {
        self.routes.borrow_mut().push(Route {
            predicate: Box::new(predicate),
            response,
            remaining,
        });
        self
    }

    /// Answer the next matching request once.
    pub fn once(
        &self,
        predicate: impl Fn(&FetchRequest) -> bool + 'static,
        response: Result<FetchResponse, TransportError>,
    ) -> &Self {
        self.push(predicate, response, Some(1))
    }

    /// Answer every matching request.
    pub fn always(
        &self,
        predicate: impl Fn(&FetchRequest) -> bool + 'static,
        response: Result<FetchResponse, TransportError>,
    ) -> &Self {
        self.push(predicate, response, None)
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.log.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.borrow().len()
    }
}

/// A 200 response with `body`.
pub fn ok(body: impl Into<String>) -> Result<FetchResponse, TransportError> {
    Ok(FetchResponse {
        status: 200,
        body: body.into(),
    })
}

/// A non-2xx failure for `url`.
pub fn status(status: u16, url: &str) -> Result<FetchResponse, TransportError> {
    Err(TransportError::Status {
        status,
        url: url.to_string(),
    })
}

/// A timeout failure.
pub fn timeout() -> Result<FetchResponse, TransportError> {
    Err(TransportError::Timeout("scripted timeout".to_string()))
}

/// Predicate: request URL equals `url`.
pub fn url_is(url: &str) -> impl Fn(&FetchRequest) -> bool + 'static {
    let url = url.to_string();
    move |req| req.url == url
}

impl Fetcher for MockFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.log.borrow_mut().push(request.clone());

        let mut routes = self.routes.borrow_mut();
        let route = routes.iter_mut().find(|r| {
            r.remaining.is_none_or(|n| n > 0) && (r.predicate)(request)
        });

        match route {
            Some(route) => {
                if let Some(n) = route.remaining.as_mut() {
                    *n -= 1;
                }
                route.response.clone()
            }
            None => Err(TransportError::Status {
                status: 404,
                url: request.url.clone(),
            }),
        }
    }
}
