use thiserror::Error;

/// Fatal configuration and contract errors surfaced by the table.
///
/// Runtime extraction misses and filter rejections are not errors; they
/// silently drop the affected row.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid field name {0}")]
    InvalidFieldName(String),

    #[error("invalid table configuration: multiple keys specified")]
    MultipleKeys,

    #[error("table is missing the key")]
    MissingKey,

    #[error("list table can't have a key")]
    ListHasKey,

    #[error("group by not supported for list tables")]
    ListGroupBy,

    #[error("invalid table configuration: more than one groupby key specified")]
    MultipleGroupByKeys,

    #[error("table is missing the groupby key")]
    MissingGroupByKey,

    #[error("groupby table has no values")]
    GroupByHasNoValues,

    #[error("table has no values")]
    EmptyTable,

    #[error("invalid table sorting column")]
    InvalidSortingColumn,

    #[error("field {0} has a kind that cannot be used as a table column")]
    InvalidFieldKind(String),

    #[error("invalid filter: {0}")]
    Filter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal table error")]
    Internal,
}
