use serde::Deserialize;

pub mod ingredient;
pub mod recipe;
pub mod shortlink;
pub mod tag;
pub mod user;

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;

/// limit/offset query parameters shared by the paginated list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, DEFAULT_PAGE_LIMIT)]
    #[case(Some(0), 1)]
    #[case(Some(-5), 1)]
    #[case(Some(25), 25)]
    #[case(Some(10_000), MAX_PAGE_LIMIT)]
    fn limit_is_clamped(#[case] requested: Option<i64>, #[case] effective: i64) {
        let page = Pagination {
            limit: requested,
            offset: None,
        };
        assert_eq!(page.limit(), effective);
    }

    #[rstest]
    #[case(None, 0)]
    #[case(Some(-1), 0)]
    #[case(Some(30), 30)]
    fn offset_never_goes_negative(#[case] requested: Option<i64>, #[case] effective: i64) {
        let page = Pagination {
            limit: None,
            offset: requested,
        };
        assert_eq!(page.offset(), effective);
    }
}
