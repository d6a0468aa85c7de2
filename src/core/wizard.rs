use thiserror::Error;

use crate::core::coerce::coerce;
use crate::models::config::{ColumnConfig, Datatype, MinerConfig, TableConfig};
use crate::models::form::FormFields;
use crate::models::state::{CompareOp, Predicate, SqlValue, WizardState};

/// 提交的表单与其携带的状态不匹配
#[derive(Debug, Error, PartialEq, Eq)]
#[error("internal error (lost {0})")]
pub struct Lost(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Equals,
    NotEquals,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Range,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
}

const ORDERED_KINDS: [ConstraintKind; 7] = [
    ConstraintKind::Equals,
    ConstraintKind::NotEquals,
    ConstraintKind::Greater,
    ConstraintKind::GreaterOrEqual,
    ConstraintKind::Less,
    ConstraintKind::LessOrEqual,
    ConstraintKind::Range,
];

const STRING_KINDS: [ConstraintKind; 6] = [
    ConstraintKind::Equals,
    ConstraintKind::NotEquals,
    ConstraintKind::StartsWith,
    ConstraintKind::EndsWith,
    ConstraintKind::Contains,
    ConstraintKind::NotContains,
];

pub const RANGE_LOW: &str = "range_low";
pub const RANGE_HIGH: &str = "range_high";
pub const RANGE_LOW_EXCLUSIVE: &str = "range_low_exclusive";
pub const RANGE_HIGH_EXCLUSIVE: &str = "range_high_exclusive";

impl ConstraintKind {
    /// 该列可选的约束种类，按菜单顺序
    pub fn for_datatype(datatype: Datatype) -> &'static [ConstraintKind] {
        match datatype {
            Datatype::String => &STRING_KINDS,
            _ => &ORDERED_KINDS,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            ConstraintKind::Equals => "eq",
            ConstraintKind::NotEquals => "ne",
            ConstraintKind::Greater => "gt",
            ConstraintKind::GreaterOrEqual => "gte",
            ConstraintKind::Less => "lt",
            ConstraintKind::LessOrEqual => "lte",
            ConstraintKind::Range => "range",
            ConstraintKind::StartsWith => "starts",
            ConstraintKind::EndsWith => "ends",
            ConstraintKind::Contains => "contains",
            ConstraintKind::NotContains => "not_contains",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        ORDERED_KINDS
            .iter()
            .chain(STRING_KINDS.iter())
            .copied()
            .find(|kind| kind.token() == token)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConstraintKind::Equals => "Equals a specific value",
            ConstraintKind::NotEquals => "Does not equal a specific value",
            ConstraintKind::Greater => "Greater than a specific value",
            ConstraintKind::GreaterOrEqual => "Greater than or equal to a specific value",
            ConstraintKind::Less => "Less than a specific value",
            ConstraintKind::LessOrEqual => "Less than or equal to a specific value",
            ConstraintKind::Range => "Within a range of values",
            ConstraintKind::StartsWith => "Starts with a specific string of characters",
            ConstraintKind::EndsWith => "Ends with a specific string of characters",
            ConstraintKind::Contains => "Contains a specific string of characters",
            ConstraintKind::NotContains => "Does not contain a specific string of characters",
        }
    }

    /// 值输入框旁的提示，后接列名
    pub fn prompt(&self) -> &'static str {
        match self {
            ConstraintKind::Equals => "Enter the value that data must equal in column",
            ConstraintKind::NotEquals => "Enter the value that data must not equal in column",
            ConstraintKind::Greater => "Enter the value that data must be greater than in column",
            ConstraintKind::GreaterOrEqual => {
                "Enter the value that data must be equal to or greater than in column"
            }
            ConstraintKind::Less => "Enter the value that data must be less than in column",
            ConstraintKind::LessOrEqual => {
                "Enter the value that data must be equal to or less than in column"
            }
            ConstraintKind::Range => "Enter the minimum and maximum values for column",
            ConstraintKind::StartsWith => "Enter the characters that data must start with in column",
            ConstraintKind::EndsWith => "Enter the characters that data must end with in column",
            ConstraintKind::Contains => "Enter the characters that data must contain in column",
            ConstraintKind::NotContains => {
                "Enter the characters that data must not contain in column"
            }
        }
    }

    /// 承载该种类取值的输入框名；区间使用 RANGE_LOW 和 RANGE_HIGH
    pub fn input_name(&self) -> String {
        format!("value_{}", self.token())
    }

    fn op(&self) -> CompareOp {
        match self {
            ConstraintKind::Equals => CompareOp::Eq,
            ConstraintKind::NotEquals => CompareOp::NotEq,
            ConstraintKind::Greater => CompareOp::Gt,
            ConstraintKind::GreaterOrEqual | ConstraintKind::Range => CompareOp::Gte,
            ConstraintKind::Less => CompareOp::Lt,
            ConstraintKind::LessOrEqual => CompareOp::Lte,
            ConstraintKind::StartsWith | ConstraintKind::EndsWith | ConstraintKind::Contains => {
                CompareOp::Like
            }
            ConstraintKind::NotContains => CompareOp::NotLike,
        }
    }

    fn pattern(&self, text: &str) -> String {
        match self {
            ConstraintKind::StartsWith => format!("{text}%"),
            ConstraintKind::EndsWith => format!("%{text}"),
            ConstraintKind::Contains | ConstraintKind::NotContains => format!("%{text}%"),
            _ => text.to_string(),
        }
    }
}

/// 值录入页上输入的内容，再次显示时回填
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entered(Vec<(String, String)>);

impl Entered {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn capture(kinds: &[ConstraintKind], form: &FormFields) -> Self {
        let mut names: Vec<String> = Vec::new();
        for kind in kinds {
            match kind {
                ConstraintKind::Range => names.extend(
                    [RANGE_LOW, RANGE_HIGH, RANGE_LOW_EXCLUSIVE, RANGE_HIGH_EXCLUSIVE]
                        .map(str::to_string),
                ),
                other => names.push(other.input_name()),
            }
        }
        Self(
            names
                .into_iter()
                .filter_map(|name| {
                    let value = form.get(&name)?.to_string();
                    Some((name, value))
                })
                .collect(),
        )
    }
}

/// 下一步要渲染的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    SelectColumns {
        state: WizardState,
        error: Option<String>,
    },
    SelectConstraintColumns {
        state: WizardState,
    },
    ConstrainColumn {
        state: WizardState,
        error: Option<String>,
    },
    EnterValues {
        state: WizardState,
        kinds: Vec<ConstraintKind>,
        entered: Entered,
        error: Option<String>,
    },
    SelectAggregates {
        state: WizardState,
    },
    Assemble {
        state: WizardState,
    },
}

impl Step {
    pub fn state(&self) -> &WizardState {
        match self {
            Step::SelectColumns { state, .. }
            | Step::SelectConstraintColumns { state }
            | Step::ConstrainColumn { state, .. }
            | Step::EnterValues { state, .. }
            | Step::SelectAggregates { state }
            | Step::Assemble { state } => state,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Step::SelectColumns { error, .. }
            | Step::ConstrainColumn { error, .. }
            | Step::EnterValues { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

pub fn start(config: &MinerConfig, form: &FormFields) -> Result<Step, Lost> {
    let table = form
        .get("table")
        .and_then(|id| config.table(id))
        .ok_or(Lost("table"))?;
    Ok(Step::SelectColumns {
        state: WizardState::new(table.id.clone()),
        error: None,
    })
}

pub fn choose_columns(
    table: &TableConfig,
    mut state: WizardState,
    form: &FormFields,
) -> Result<Step, Lost> {
    let columns = submitted_indices(form, "column", |c| table.column(c).is_some())?;
    if columns.is_empty() {
        return Ok(Step::SelectColumns {
            state,
            error: Some("No columns selected, please choose at least one".to_string()),
        });
    }
    state.selected = columns;
    Ok(Step::SelectConstraintColumns { state })
}

pub fn choose_constraint_columns(mut state: WizardState, form: &FormFields) -> Result<Step, Lost> {
    let constrained = submitted_indices(form, "constrain", |c| state.selected.contains(&c))?;
    state.constrained = constrained;
    state.cursor = 0;
    Ok(resume(state))
}

/// 下一个待约束的列；全部完成后进入聚合选择
pub fn resume(state: WizardState) -> Step {
    match state.current_column() {
        Some(_) => Step::ConstrainColumn { state, error: None },
        None => Step::SelectAggregates { state },
    }
}

pub fn choose_constraint(
    table: &TableConfig,
    mut state: WizardState,
    form: &FormFields,
) -> Result<Step, Lost> {
    let (index, column) = current(table, &state)?;

    if column.code_lookup().is_some() {
        let codes: Vec<String> = form.get_all("code").map(str::to_string).collect();
        if codes.is_empty() {
            return Ok(Step::ConstrainColumn {
                state,
                error: Some(format!("No values selected for column {}", column.name)),
            });
        }
        state.predicates.push(Predicate::InList {
            column: index,
            codes,
        });
        state.cursor += 1;
        return Ok(resume(state));
    }

    let kinds = submitted_kinds(column, form, "kind")?;
    if kinds.is_empty() {
        return Ok(Step::ConstrainColumn {
            state,
            error: Some(format!("No constraint type selected for column {}", column.name)),
        });
    }
    Ok(Step::EnterValues {
        state,
        kinds,
        entered: Entered::default(),
        error: None,
    })
}

/// 校验全部输入值后追加谓词，全有或全无
pub fn apply_constraint(
    table: &TableConfig,
    mut state: WizardState,
    form: &FormFields,
) -> Result<Step, Lost> {
    let (index, column) = current(table, &state)?;
    let kinds = submitted_kinds(column, form, "kinds")?;
    if kinds.is_empty() {
        return Err(Lost("kinds"));
    }

    match predicates(index, column, &kinds, form) {
        Ok(predicates) => {
            state.predicates.extend(predicates);
            state.cursor += 1;
            Ok(resume(state))
        }
        Err(message) => {
            tracing::debug!(column = %column.column, %message, "constraint value rejected");
            let entered = Entered::capture(&kinds, form);
            Ok(Step::EnterValues {
                state,
                kinds,
                entered,
                error: Some(message),
            })
        }
    }
}

pub fn choose_aggregates(
    table: &TableConfig,
    mut state: WizardState,
    form: &FormFields,
) -> Result<Step, Lost> {
    if state.current_column().is_some() {
        return Err(Lost("cursor"));
    }
    let aggregable = |c: usize| {
        state.selected.contains(&c) && table.column(c).is_some_and(|col| col.datatype.is_numeric())
    };
    let count = submitted_indices(form, "count", aggregable)?;
    let sum = submitted_indices(form, "sum", aggregable)?;
    state.count = count.into_iter().collect();
    state.sum = sum.into_iter().collect();
    Ok(Step::Assemble { state })
}

fn current<'a>(
    table: &'a TableConfig,
    state: &WizardState,
) -> Result<(usize, &'a ColumnConfig), Lost> {
    let index = state.current_column().ok_or(Lost("cursor"))?;
    let column = table.column(index).ok_or(Lost("column"))?;
    Ok((index, column))
}

fn submitted_indices(
    form: &FormFields,
    name: &'static str,
    allowed: impl Fn(usize) -> bool,
) -> Result<Vec<usize>, Lost> {
    let mut out = Vec::new();
    for raw in form.get_all(name) {
        let index: usize = raw.parse().map_err(|_| Lost(name))?;
        if !allowed(index) {
            return Err(Lost(name));
        }
        if !out.contains(&index) {
            out.push(index);
        }
    }
    Ok(out)
}

fn submitted_kinds(
    column: &ColumnConfig,
    form: &FormFields,
    name: &'static str,
) -> Result<Vec<ConstraintKind>, Lost> {
    let offered = ConstraintKind::for_datatype(column.datatype);
    let mut chosen = Vec::new();
    for token in form.get_all(name) {
        let kind = ConstraintKind::from_token(token)
            .filter(|k| offered.contains(k))
            .ok_or(Lost(name))?;
        chosen.push(kind);
    }
    Ok(offered
        .iter()
        .copied()
        .filter(|k| chosen.contains(k))
        .collect())
}

fn predicates(
    index: usize,
    column: &ColumnConfig,
    kinds: &[ConstraintKind],
    form: &FormFields,
) -> Result<Vec<Predicate>, String> {
    let value = |name: &str| -> Result<SqlValue, String> {
        let raw = form.get(name).unwrap_or_default();
        coerce(raw, column.datatype).map_err(|e| format!("{e} of column {}", column.name))
    };
    let compare = |op: CompareOp, value: SqlValue| Predicate::Compare {
        column: index,
        op,
        value,
    };

    let mut out = Vec::new();
    for kind in kinds {
        match kind {
            ConstraintKind::Range => {
                let present = |name| form.get(name).is_some_and(|v| !v.is_empty());
                if !present(RANGE_LOW) || !present(RANGE_HIGH) {
                    return Err(format!(
                        "Incomplete range specification for column {}, both a minimum and a maximum are needed",
                        column.name
                    ));
                }
                let low_op = if form.contains(RANGE_LOW_EXCLUSIVE) {
                    CompareOp::Gt
                } else {
                    CompareOp::Gte
                };
                let high_op = if form.contains(RANGE_HIGH_EXCLUSIVE) {
                    CompareOp::Lt
                } else {
                    CompareOp::Lte
                };
                out.push(compare(low_op, value(RANGE_LOW)?));
                out.push(compare(high_op, value(RANGE_HIGH)?));
            }
            kind => {
                let checked = value(&kind.input_name())?;
                let checked = match checked {
                    SqlValue::Text(text) => SqlValue::Text(kind.pattern(&text)),
                    other => other,
                };
                out.push(compare(kind.op(), checked));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::MineQuery;
    use crate::models::config::fixtures;
    use pretty_assertions::assert_eq;

    fn constraining(columns: &[usize]) -> WizardState {
        let mut state = WizardState::new("orders");
        state.selected = columns.to_vec();
        state.constrained = columns.to_vec();
        state
    }

    #[test]
    fn starts_with_the_chosen_table() {
        let config = fixtures::config();
        let step = start(&config, &FormFields::from([("table", "orders")])).unwrap();
        assert_eq!(
            step,
            Step::SelectColumns {
                state: WizardState::new("orders"),
                error: None,
            }
        );
        assert_eq!(
            start(&config, &FormFields::from([("table", "invoices")])),
            Err(Lost("table"))
        );
    }

    #[test]
    fn zero_columns_prompts_again() {
        let table = fixtures::orders();
        let step = choose_columns(&table, WizardState::new("orders"), &FormFields::default()).unwrap();
        assert!(matches!(step, Step::SelectColumns { error: Some(_), .. }));
        assert!(step.state().selected.is_empty());
    }

    #[test]
    fn selected_columns_keep_submission_order() {
        let table = fixtures::orders();
        let form = FormFields::from([("column", "3"), ("column", "0"), ("column", "3")]);
        let step = choose_columns(&table, WizardState::new("orders"), &form).unwrap();
        assert_eq!(step.state().selected, vec![3, 0]);
        assert!(matches!(step, Step::SelectConstraintColumns { .. }));

        let form = FormFields::from([("column", "17")]);
        assert_eq!(
            choose_columns(&table, WizardState::new("orders"), &form),
            Err(Lost("column"))
        );
    }

    #[test]
    fn no_constrained_columns_skips_to_aggregates() {
        let mut state = WizardState::new("orders");
        state.selected = vec![0, 3];
        let step = choose_constraint_columns(state.clone(), &FormFields::default()).unwrap();
        assert_eq!(step, Step::SelectAggregates { state: state.clone() });

        let form = FormFields::from([("constrain", "1")]);
        assert_eq!(choose_constraint_columns(state, &form), Err(Lost("constrain")));
    }

    #[test]
    fn lookup_columns_append_a_code_list() {
        let table = fixtures::orders();
        let form = FormFields::from([("code", "A"), ("code", "B")]);
        let step = choose_constraint(&table, constraining(&[1]), &form).unwrap();

        let Step::SelectAggregates { state } = step else {
            panic!("expected aggregates, got {step:?}");
        };
        assert_eq!(state.cursor, 1);
        assert_eq!(
            state.predicates,
            vec![Predicate::InList {
                column: 1,
                codes: vec!["A".to_string(), "B".to_string()],
            }]
        );
    }

    #[test]
    fn kinds_are_offered_by_datatype_and_kept_in_menu_order() {
        let table = fixtures::orders();
        let form = FormFields::from([("kind", "lt"), ("kind", "gt")]);
        let step = choose_constraint(&table, constraining(&[0]), &form).unwrap();
        let Step::EnterValues { kinds, .. } = step else {
            panic!("expected value entry, got {step:?}");
        };
        assert_eq!(kinds, vec![ConstraintKind::Greater, ConstraintKind::Less]);

        let form = FormFields::from([("kind", "contains")]);
        assert_eq!(
            choose_constraint(&table, constraining(&[0]), &form),
            Err(Lost("kind"))
        );

        let step = choose_constraint(&table, constraining(&[3]), &FormFields::default()).unwrap();
        assert!(matches!(step, Step::ConstrainColumn { error: Some(_), .. }));
    }

    #[test]
    fn invalid_numbers_leave_the_fragment_untouched() {
        let table = fixtures::orders();
        let mut state = constraining(&[3, 0]);
        state.cursor = 1;
        state.predicates = vec![Predicate::Compare {
            column: 3,
            op: CompareOp::Eq,
            value: SqlValue::Text("North".to_string()),
        }];
        let form = FormFields::from([
            ("kinds", "gt"),
            ("kinds", "lt"),
            ("value_gt", "10"),
            ("value_lt", "lots"),
        ]);

        let step = apply_constraint(&table, state.clone(), &form).unwrap();
        let Step::EnterValues {
            state: after,
            entered,
            error,
            ..
        } = step
        else {
            panic!("expected value entry, got {step:?}");
        };
        assert_eq!(after, state);
        assert_eq!(entered.get("value_lt"), Some("lots"));
        assert_eq!(
            error.as_deref(),
            Some("value \"lots\" is not valid for the numeric datatype of column Order amount")
        );
    }

    #[test]
    fn sequential_constraints_join_with_and_in_order() {
        let table = fixtures::orders();
        let mut state = constraining(&[0, 3, 4]);
        for (kind, value) in [("gt", "5"), ("starts", "No"), ("lte", "9")] {
            let form = FormFields::from([("kinds", kind), (&*format!("value_{kind}"), value)]);
            state = apply_constraint(&table, state, &form).unwrap().state().clone();
        }

        assert_eq!(state.cursor, 3);
        let fragment = MineQuery::assemble(&table, &state).where_fragment();
        assert_eq!(fragment, r#"amount > 5 AND region like "No%" AND quantity <= 9"#);
        assert_eq!(fragment.matches(" AND ").count(), 2);
    }

    #[test]
    fn date_range_honours_exclusion_boxes() {
        let table = fixtures::orders();
        let form = FormFields::from([
            ("kinds", "range"),
            (RANGE_LOW, "2020-01-01"),
            (RANGE_HIGH, "2020-12-31"),
            (RANGE_HIGH_EXCLUSIVE, "on"),
        ]);
        let step = apply_constraint(&table, constraining(&[2]), &form).unwrap();
        assert_eq!(
            MineQuery::assemble(&table, step.state()).where_fragment(),
            r#"placed >= "2020-01-01" AND placed < "2020-12-31""#
        );
    }

    #[test]
    fn incomplete_range_prompts_again() {
        let table = fixtures::orders();
        let form = FormFields::from([("kinds", "range"), (RANGE_LOW, "1")]);
        let step = apply_constraint(&table, constraining(&[4]), &form).unwrap();
        assert!(matches!(step, Step::EnterValues { error: Some(_), .. }));
        assert!(step.state().predicates.is_empty());
    }

    #[test]
    fn pattern_kinds_wrap_the_text() {
        let table = fixtures::orders();
        let form = FormFields::from([
            ("kinds", "ends"),
            ("kinds", "not_contains"),
            ("value_ends", "th"),
            ("value_not_contains", "x"),
        ]);
        let step = apply_constraint(&table, constraining(&[3]), &form).unwrap();
        assert_eq!(
            MineQuery::assemble(&table, step.state()).where_fragment(),
            r#"region like "%th" AND region not like "%x%""#
        );
    }

    #[test]
    fn aggregates_only_on_selected_numeric_columns() {
        let table = fixtures::orders();
        let mut state = WizardState::new("orders");
        state.selected = vec![0, 3];

        let form = FormFields::from([("count", "0"), ("sum", "0")]);
        let step = choose_aggregates(&table, state.clone(), &form).unwrap();
        let Step::Assemble { state: done } = step else {
            panic!("expected assembly, got {step:?}");
        };
        assert!(done.count.contains(&0) && done.sum.contains(&0));

        let form = FormFields::from([("sum", "3")]);
        assert_eq!(choose_aggregates(&table, state, &form), Err(Lost("sum")));
    }
}
