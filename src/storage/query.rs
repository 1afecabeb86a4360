//! Typed SQL composition for item queries.
//!
//! Every fragment writes its SQL text and pushes its bound values in the same
//! call, so the parameter list always lines up with the `?` placeholders in
//! the order they appear. User-facing queries start from [`ScopedQuery`],
//! which joins items to feeds and filters on the feed owner before any other
//! predicate is added.

use super::status::StatusFlags;

// ============================================================================
// Statement
// ============================================================================

/// A positional parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Text(String),
}

/// SQL text paired with the values for its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
}

impl Statement {
    fn new(head: &str) -> Self {
        Self {
            sql: head.to_owned(),
            params: Vec::new(),
        }
    }

    /// Append a fragment and the values bound by its placeholders.
    fn push(&mut self, fragment: &str, params: impl IntoIterator<Item = Param>) {
        self.sql.push_str(fragment);
        self.params.extend(params);
    }

    fn push_sql(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of `?` placeholders in the SQL text.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Convert a caller row cap into a bindable LIMIT, `None` meaning unbounded.
fn limit_param(limit: u64) -> Option<i64> {
    (limit > 0).then(|| i64::try_from(limit).unwrap_or(i64::MAX))
}

// ============================================================================
// Predicates
// ============================================================================

/// A single `AND`-joined condition over the `items`/`feeds` aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `feeds.user_id = ?`
    Owner(String),
    /// All bits of the mask set: `((items.status & ?) = ?)` bound to `(mask, mask)`
    Status(StatusFlags),
    /// None of the bits set: `((items.status & ?) = 0)`
    StatusClear(StatusFlags),
    /// `items.id = ?`
    Item(i64),
    /// `items.feed_id = ?`
    Feed(i64),
    /// `feeds.folder_id = ?`
    Folder(i64),
    /// `items.guid_hash = ?`
    GuidHash(String),
    /// Exclusive lower bound, `items.id > ?`
    After(i64),
    /// Inclusive lower bound, `items.id >= ?`
    Since(i64),
    /// Inclusive upper bound, `items.id <= ?`
    UpTo(i64),
    /// Exclusive upper bound, `items.id < ?`
    Below(i64),
    /// Item's feed is `feed_id` and is owned by `user_id`, without a join
    FeedOwnedBy { user_id: String, feed_id: i64 },
}

impl Predicate {
    fn render(&self, stmt: &mut Statement) {
        match self {
            Predicate::Owner(user_id) => {
                stmt.push("feeds.user_id = ?", [Param::Text(user_id.clone())])
            }
            Predicate::Status(mask) => stmt.push(
                "((items.status & ?) = ?)",
                [Param::Int(mask.to_column()), Param::Int(mask.to_column())],
            ),
            Predicate::StatusClear(mask) => {
                stmt.push("((items.status & ?) = 0)", [Param::Int(mask.to_column())])
            }
            Predicate::Item(id) => stmt.push("items.id = ?", [Param::Int(*id)]),
            Predicate::Feed(id) => stmt.push("items.feed_id = ?", [Param::Int(*id)]),
            Predicate::Folder(id) => stmt.push("feeds.folder_id = ?", [Param::Int(*id)]),
            Predicate::GuidHash(hash) => {
                stmt.push("items.guid_hash = ?", [Param::Text(hash.clone())])
            }
            Predicate::After(id) => stmt.push("items.id > ?", [Param::Int(*id)]),
            Predicate::Since(id) => stmt.push("items.id >= ?", [Param::Int(*id)]),
            Predicate::UpTo(id) => stmt.push("items.id <= ?", [Param::Int(*id)]),
            Predicate::Below(id) => stmt.push("items.id < ?", [Param::Int(*id)]),
            Predicate::FeedOwnedBy { user_id, feed_id } => stmt.push(
                "items.feed_id IN (SELECT feeds.id FROM feeds WHERE feeds.user_id = ? AND feeds.id = ?)",
                [Param::Text(user_id.clone()), Param::Int(*feed_id)],
            ),
        }
    }
}

fn push_where(stmt: &mut Statement, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        stmt.push_sql(if i == 0 { " WHERE " } else { " AND " });
        predicate.render(stmt);
    }
}

fn push_limit(stmt: &mut Statement, limit: Option<i64>) {
    if let Some(limit) = limit {
        stmt.push(" LIMIT ?", [Param::Int(limit)]);
    }
}

// ============================================================================
// Scoped Queries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    Items,
    Count,
}

/// Builder for SELECTs over the items→feeds join, restricted to one user.
///
/// Rendered order is fixed: owner, then the status test (if any), then the
/// remaining predicates in the order they were added, then ORDER BY and
/// LIMIT. Parameters follow the same order.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    projection: Projection,
    owner: String,
    status: Option<StatusFlags>,
    predicates: Vec<Predicate>,
    newest_first: bool,
    limit: Option<i64>,
}

impl ScopedQuery {
    fn new(projection: Projection, user_id: &str) -> Self {
        Self {
            projection,
            owner: user_id.to_owned(),
            status: None,
            predicates: Vec::new(),
            newest_first: false,
            limit: None,
        }
    }

    /// `SELECT items.*` for items whose feed belongs to `user_id`.
    pub fn items(user_id: &str) -> Self {
        Self::new(Projection::Items, user_id)
    }

    /// `SELECT COUNT(*)` over the same scope.
    pub fn count(user_id: &str) -> Self {
        Self::new(Projection::Count, user_id)
    }

    /// Require every bit of `mask`. An empty mask still renders and matches all rows.
    pub fn with_status(mut self, mask: StatusFlags) -> Self {
        self.status = Some(mask);
        self
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Cap the row count. Zero leaves the query unbounded.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit_param(limit);
        self
    }

    pub fn build(&self) -> Statement {
        let mut stmt = Statement::new(match self.projection {
            Projection::Items => "SELECT items.* FROM items",
            Projection::Count => "SELECT COUNT(*) FROM items",
        });
        stmt.push_sql(" JOIN feeds ON feeds.id = items.feed_id");

        let mut predicates = Vec::with_capacity(self.predicates.len() + 2);
        predicates.push(Predicate::Owner(self.owner.clone()));
        if let Some(mask) = self.status {
            predicates.push(Predicate::Status(mask));
        }
        predicates.extend(self.predicates.iter().cloned());
        push_where(&mut stmt, &predicates);

        if self.newest_first {
            stmt.push_sql(" ORDER BY items.id DESC");
        }
        push_limit(&mut stmt, self.limit);
        stmt
    }
}

// ============================================================================
// Bulk Statements
// ============================================================================

/// Clear UNREAD on a user's feed up to and including `highest_item_id`.
///
/// The SET expression ANDs the status with the complement of UNREAD as a raw
/// integer, so STARRED and any unknown bits are left as they were.
pub fn mark_feed_read(user_id: &str, feed_id: i64, highest_item_id: i64) -> Statement {
    let clear_unread = !StatusFlags::UNREAD.to_column();
    let mut stmt = Statement::default();
    stmt.push(
        "UPDATE items SET status = (items.status & ?)",
        [Param::Int(clear_unread)],
    );
    push_where(
        &mut stmt,
        &[
            Predicate::FeedOwnedBy {
                user_id: user_id.to_owned(),
                feed_id,
            },
            Predicate::UpTo(highest_item_id),
        ],
    );
    stmt
}

fn read_and_unstarred() -> Predicate {
    Predicate::StatusClear(StatusFlags::UNREAD | StatusFlags::STARRED)
}

/// Read, unstarred items across every user. Unordered.
pub fn select_read_unstarred(limit: u64) -> Statement {
    let mut stmt = Statement::new("SELECT items.* FROM items");
    push_where(&mut stmt, &[read_and_unstarred()]);
    push_limit(&mut stmt, limit_param(limit));
    stmt
}

/// Delete read, unstarred items with `id < below_id`, across every user.
pub fn delete_read_unstarred_below(below_id: i64) -> Statement {
    let mut stmt = Statement::new("DELETE FROM items");
    push_where(&mut stmt, &[Predicate::Below(below_id), read_and_unstarred()]);
    stmt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn text(s: &str) -> Param {
        Param::Text(s.to_string())
    }

    #[test]
    fn test_base_scope_binds_user_first() {
        let stmt = ScopedQuery::items("alice").build();
        assert_eq!(
            stmt.sql(),
            "SELECT items.* FROM items JOIN feeds ON feeds.id = items.feed_id WHERE feeds.user_id = ?"
        );
        assert_eq!(stmt.params(), &[text("alice")]);
    }

    #[test]
    fn test_status_scope_binds_mask_twice_after_user() {
        let stmt = ScopedQuery::items("alice")
            .with_status(StatusFlags::STARRED)
            .and(Predicate::Feed(7))
            .and(Predicate::After(40))
            .newest_first()
            .limit(20)
            .build();

        assert_eq!(
            stmt.sql(),
            "SELECT items.* FROM items JOIN feeds ON feeds.id = items.feed_id \
             WHERE feeds.user_id = ? AND ((items.status & ?) = ?) \
             AND items.feed_id = ? AND items.id > ? ORDER BY items.id DESC LIMIT ?"
        );
        assert_eq!(
            stmt.params(),
            &[
                text("alice"),
                Param::Int(4),
                Param::Int(4),
                Param::Int(7),
                Param::Int(40),
                Param::Int(20),
            ]
        );
    }

    #[test]
    fn test_status_is_rendered_before_earlier_added_predicates() {
        let stmt = ScopedQuery::items("bob")
            .and(Predicate::Folder(3))
            .with_status(StatusFlags::UNREAD)
            .build();
        assert_eq!(
            stmt.params(),
            &[text("bob"), Param::Int(2), Param::Int(2), Param::Int(3)]
        );
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let stmt = ScopedQuery::items("alice").limit(0).build();
        assert!(!stmt.sql().contains("LIMIT"));
    }

    #[test]
    fn test_count_projection() {
        let stmt = ScopedQuery::count("alice")
            .with_status(StatusFlags::STARRED)
            .build();
        assert!(stmt.sql().starts_with("SELECT COUNT(*) FROM items JOIN feeds"));
        assert_eq!(stmt.placeholder_count(), 3);
    }

    #[test]
    fn test_mark_feed_read_preserves_other_bits() {
        let stmt = mark_feed_read("alice", 5, 99);
        assert_eq!(
            stmt.sql(),
            "UPDATE items SET status = (items.status & ?) WHERE items.feed_id IN \
             (SELECT feeds.id FROM feeds WHERE feeds.user_id = ? AND feeds.id = ?) AND items.id <= ?"
        );
        assert_eq!(
            stmt.params(),
            &[Param::Int(!2), text("alice"), Param::Int(5), Param::Int(99)]
        );
        let cleared = (StatusFlags::all().to_column() | 0x10) & !2;
        assert_eq!(cleared, StatusFlags::STARRED.to_column() | 0x10);
    }

    #[test]
    fn test_retention_statements_are_not_user_scoped() {
        let select = select_read_unstarred(100);
        assert_eq!(
            select.sql(),
            "SELECT items.* FROM items WHERE ((items.status & ?) = 0) LIMIT ?"
        );
        assert_eq!(select.params(), &[Param::Int(6), Param::Int(100)]);

        let delete = delete_read_unstarred_below(50);
        assert_eq!(
            delete.sql(),
            "DELETE FROM items WHERE items.id < ? AND ((items.status & ?) = 0)"
        );
        assert_eq!(delete.params(), &[Param::Int(50), Param::Int(6)]);
        assert!(!delete.sql().contains("feeds"));
    }

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        prop_oneof![
            any::<i64>().prop_map(Predicate::Item),
            any::<i64>().prop_map(Predicate::Feed),
            any::<i64>().prop_map(Predicate::Folder),
            "[a-f0-9?]{0,16}".prop_map(Predicate::GuidHash),
            any::<i64>().prop_map(Predicate::After),
            any::<i64>().prop_map(Predicate::Since),
        ]
    }

    fn expected_params(predicate: &Predicate) -> Vec<Param> {
        match predicate {
            Predicate::Item(v)
            | Predicate::Feed(v)
            | Predicate::Folder(v)
            | Predicate::After(v)
            | Predicate::Since(v) => vec![Param::Int(*v)],
            Predicate::GuidHash(h) => vec![Param::Text(h.clone())],
            other => panic!("not generated: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_params_follow_placeholder_order(
            user in "[a-z]{1,8}",
            status in proptest::option::of(0i64..8),
            predicates in proptest::collection::vec(arb_predicate(), 0..6),
            newest_first in any::<bool>(),
            limit in 0u64..1000,
        ) {
            let mut query = ScopedQuery::items(&user);
            if let Some(bits) = status {
                query = query.with_status(StatusFlags::from_bits_retain(bits));
            }
            for predicate in &predicates {
                query = query.and(predicate.clone());
            }
            if newest_first {
                query = query.newest_first();
            }
            let stmt = query.limit(limit).build();

            let mut expected = vec![Param::Text(user.clone())];
            if let Some(bits) = status {
                expected.push(Param::Int(bits));
                expected.push(Param::Int(bits));
            }
            for predicate in &predicates {
                expected.extend(expected_params(predicate));
            }
            if limit > 0 {
                expected.push(Param::Int(limit as i64));
            }

            prop_assert_eq!(stmt.placeholder_count(), stmt.params().len());
            prop_assert_eq!(stmt.params(), expected.as_slice());
        }
    }
}
