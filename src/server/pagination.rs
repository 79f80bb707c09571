use std::num::IntErrorKind;

use serde::Deserialize;

pub const QUESTIONS_PER_PAGE: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// 1-based page number; anything that is not an integer means the first page.
    /// Integers outside the `i64` range saturate, so they still select an empty page.
    pub fn page(&self) -> i64 {
        let Some(page) = self.page.as_deref() else {
            return 1;
        };
        match page.trim().parse::<i64>() {
            Ok(page) => page,
            Err(err) => match err.kind() {
                IntErrorKind::PosOverflow => i64::MAX,
                IntErrorKind::NegOverflow => i64::MIN,
                _ => 1,
            },
        }
    }
}

/// Returns `items[(page-1)*10 .. page*10]`, clipped to the slice. Pages below 1 are empty.
pub fn paginate<T>(items: &[T], page: i64) -> &[T] {
    if page < 1 {
        return &[];
    }
    let start = usize::try_from(page - 1)
        .unwrap_or(usize::MAX)
        .saturating_mul(QUESTIONS_PER_PAGE);
    if start >= items.len() {
        return &[];
    }
    let end = (start + QUESTIONS_PER_PAGE).min(items.len());
    &items[start..end]
}
