// Pagination driver
// Walks an offset-paginated list endpoint from offset 0 until the API reports
// no further pages, counting every call and handing each item to a visitor
//
// Numan Thabit 2025 Nov

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ExporterError;
use crate::metrics::ApiCounter;
use crate::transport::{ListOptions, Page};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub pages: u32,
    pub items: u32,
}

/// Fetch every page for `operation`, starting at offset 0 with `template`'s limit and filters.
///
/// Each completed call bumps the API counter before its result is inspected, so
/// failed calls are counted too. The first error or a cancellation aborts the walk.
/// The counter tracks completed calls only; a call abandoned on cancellation is not counted.
pub async fn paginate<T, F, Fut, V>(
    operation: &str,
    template: &ListOptions,
    counter: &ApiCounter,
    cancel: &CancellationToken,
    mut fetch: F,
    mut visit: V,
) -> Result<PageStats, ExporterError>
where
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = Result<Page<T>, ExporterError>>,
    V: FnMut(T),
{
    let mut opts = ListOptions {
        offset: 0,
        ..template.clone()
    };
    let mut stats = PageStats::default();

    loop {
        if cancel.is_cancelled() {
            return Err(ExporterError::Cancelled);
        }
        debug!(
            operation = operation,
            offset = opts.offset,
            limit = opts.limit,
            "fetch page"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExporterError::Cancelled),
            res = fetch(opts.clone()) => res,
        };
        counter.inc(operation);
        let page = result?;

        stats.pages += 1;
        let returned = page.items.len() as u32;
        stats.items += returned;
        for item in page.items {
            visit(item);
        }

        if !page.more {
            break;
        }
        if returned == 0 {
            warn!(
                operation = operation,
                offset = opts.offset,
                "empty page flagged with more results; stopping"
            );
            break;
        }
        opts.offset += returned;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;
    use std::sync::Mutex;

    fn pages_of(total: u32, limit: u32) -> impl FnMut(ListOptions) -> std::future::Ready<Result<Page<u32>, ExporterError>> {
        move |opts: ListOptions| {
            let end = (opts.offset + opts.limit).min(total);
            std::future::ready(Ok(Page {
                items: (opts.offset..end).collect(),
                limit: opts.limit,
                offset: opts.offset,
                more: end < total,
            }))
        }
    }

    fn template(limit: u32) -> ListOptions {
        ListOptions {
            limit,
            ..ListOptions::default()
        }
    }

    #[tokio::test]
    async fn issues_ceil_total_over_limit_calls_and_visits_each_item_once() {
        for (total, limit) in [(0, 10), (1, 10), (10, 10), (25, 10), (100, 7)] {
            let counter = ApiCounter::new(&Registry::new()).unwrap();
            let mut seen = Vec::new();
            let stats = paginate(
                "ListThings",
                &template(limit),
                &counter,
                &CancellationToken::new(),
                pages_of(total, limit),
                |item| seen.push(item),
            )
            .await
            .unwrap();

            let expected_calls = total.div_ceil(limit).max(1);
            assert_eq!(stats.pages, expected_calls, "total={total} limit={limit}");
            assert_eq!(counter.get("ListThings"), expected_calls as u64);
            assert_eq!(seen, (0..total).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn filters_are_forwarded_on_every_page() {
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let observed = Mutex::new(Vec::new());
        let mut inner = pages_of(5, 2);
        let opts = ListOptions {
            limit: 2,
            offset: 40,
            team_ids: vec!["PT1".into()],
            earliest: true,
        };
        paginate(
            "ListThings",
            &opts,
            &counter,
            &CancellationToken::new(),
            |o: ListOptions| {
                observed.lock().unwrap().push(o.clone());
                inner(o)
            },
            |_| {},
        )
        .await
        .unwrap();

        let observed = observed.into_inner().unwrap();
        let offsets: Vec<_> = observed.iter().map(|o| o.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
        assert!(observed.iter().all(|o| o.team_ids == ["PT1"] && o.earliest));
    }

    #[tokio::test]
    async fn failed_call_is_counted_and_aborts() {
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let mut inner = pages_of(50, 10);
        let mut visited = 0;
        let err = paginate(
            "ListThings",
            &template(10),
            &counter,
            &CancellationToken::new(),
            |o: ListOptions| {
                if o.offset == 20 {
                    std::future::ready(Err(ExporterError::Transport("boom".into())))
                } else {
                    inner(o)
                }
            },
            |_| visited += 1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExporterError::Transport(_)));
        assert_eq!(counter.get("ListThings"), 3);
        assert_eq!(visited, 20);
    }

    #[tokio::test]
    async fn empty_page_with_more_flag_stops() {
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let stats = paginate(
            "ListThings",
            &template(10),
            &counter,
            &CancellationToken::new(),
            |o: ListOptions| {
                std::future::ready(Ok(Page::<u32> {
                    items: Vec::new(),
                    limit: o.limit,
                    offset: o.offset,
                    more: true,
                }))
            },
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(stats.pages, 1);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_fetching() {
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = paginate(
            "ListThings",
            &template(10),
            &counter,
            &cancel,
            pages_of(10, 10),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExporterError::Cancelled));
        assert_eq!(counter.get("ListThings"), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_pending_call() {
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let err = paginate(
            "ListThings",
            &template(10),
            &counter,
            &cancel,
            move |_o: ListOptions| {
                trigger.cancel();
                futures::future::pending::<Result<Page<u32>, ExporterError>>()
            },
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExporterError::Cancelled));
        assert_eq!(counter.get("ListThings"), 0);
    }
}
