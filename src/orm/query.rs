//! Select-tail construction: where/order-by fragments and limits.

use serde_json::Value;

/// Row limit for `find_all`: a plain count, or an (offset, count) window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    Offset(u64, u64),
}

impl From<u64> for Limit {
    fn from(n: u64) -> Limit {
        Limit::Count(n)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Limit {
        Limit::Offset(offset, count)
    }
}

/// Tail of a select statement. Fragments are raw SQL with `?` markers; their
/// arguments bind in the order given.
#[derive(Default)]
pub struct Query<'a> {
    where_clause: Option<&'a str>,
    args: Vec<Value>,
    order_by: Option<&'a str>,
    limit: Option<Limit>,
}

impl<'a> Query<'a> {
    pub fn new() -> Query<'a> {
        Query::default()
    }

    /// Filter fragment, e.g. `email=?`. An empty fragment is ignored.
    pub fn where_clause(mut self, fragment: &'a str) -> Query<'a> {
        self.where_clause = Some(fragment);
        self
    }

    /// Bind the next `?` in the where fragment.
    pub fn bind(mut self, v: impl Into<Value>) -> Query<'a> {
        self.args.push(v.into());
        self
    }

    /// Ordering fragment, e.g. `created_at desc`.
    pub fn order_by(mut self, fragment: &'a str) -> Query<'a> {
        self.order_by = Some(fragment);
        self
    }

    /// Limit the result window; accepts a count or an (offset, count) pair.
    pub fn limit(mut self, l: impl Into<Limit>) -> Query<'a> {
        self.limit = Some(l.into());
        self
    }

    /// Append the tail to `sql`, extending `args` in bind order. The limit
    /// always binds through placeholders: one for a count, two for an
    /// (offset, count) window.
    pub(crate) fn append_to(&self, sql: &mut String, args: &mut Vec<Value>) {
        if let Some(w) = self.where_clause.filter(|w| !w.is_empty()) {
            sql.push_str(" where ");
            sql.push_str(w);
        }
        args.extend(self.args.iter().cloned());
        if let Some(o) = self.order_by.filter(|o| !o.is_empty()) {
            sql.push_str(" order by ");
            sql.push_str(o);
        }
        match self.limit {
            Some(Limit::Count(n)) => {
                sql.push_str(" limit ?");
                args.push(Value::from(n));
            }
            Some(Limit::Offset(offset, count)) => {
                sql.push_str(" limit ?, ?");
                args.push(Value::from(offset));
                args.push(Value::from(count));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(q: Query<'_>) -> (String, Vec<Value>) {
        let mut sql = String::from("select `id` from `t`");
        let mut args = Vec::new();
        q.append_to(&mut sql, &mut args);
        (sql, args)
    }

    #[test]
    fn bare_query_appends_nothing() {
        let (sql, args) = render(Query::new());
        assert_eq!(sql, "select `id` from `t`");
        assert!(args.is_empty());
    }

    #[test]
    fn where_and_order_fragments_are_appended_in_order() {
        let q = Query::new()
            .where_clause("email=?")
            .bind("a@b.c")
            .order_by("created_at desc");
        let (sql, args) = render(q);
        assert_eq!(sql, "select `id` from `t` where email=? order by created_at desc");
        assert_eq!(args, vec![Value::from("a@b.c")]);
    }

    #[test]
    fn empty_where_fragment_omits_the_clause() {
        let (sql, _) = render(Query::new().where_clause(""));
        assert_eq!(sql, "select `id` from `t`");
    }

    #[test]
    fn count_limit_appends_one_placeholder() {
        let (sql, args) = render(Query::new().limit(5u64));
        assert_eq!(sql, "select `id` from `t` limit ?");
        assert_eq!(args, vec![Value::from(5u64)]);
    }

    #[test]
    fn offset_limit_appends_two_placeholders_in_offset_count_order() {
        let (sql, args) = render(Query::new().limit((10u64, 5u64)));
        assert_eq!(sql, "select `id` from `t` limit ?, ?");
        assert_eq!(args, vec![Value::from(10u64), Value::from(5u64)]);
    }

    #[test]
    fn zero_limit_passes_through() {
        let (sql, args) = render(Query::new().limit(0u64));
        assert_eq!(sql, "select `id` from `t` limit ?");
        assert_eq!(args, vec![Value::from(0u64)]);
    }

    #[test]
    fn limit_args_follow_where_args() {
        let q = Query::new().where_clause("user_id=?").bind("u1").limit((20u64, 10u64));
        let (sql, args) = render(q);
        assert_eq!(sql, "select `id` from `t` where user_id=? limit ?, ?");
        assert_eq!(
            args,
            vec![Value::from("u1"), Value::from(20u64), Value::from(10u64)]
        );
    }
}
