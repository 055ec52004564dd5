//! Plain-text reply rendering.

use chrono::FixedOffset;

use crate::aggregate::{Aggregate, GroupBy};
use crate::domain::ExpenseRecord;

pub const HELP_TEXT: &str = "欢迎使用记账机器人！\n\
直接发送“早餐 15”就能记账，发送“+100”记收入，“-30”记支出。\n\
\n\
/add 金额 类别 描述：详细记一笔\n\
/total：今日花费\n\
/list：最近的记录\n\
/stats：收支统计（群组中含成员明细）\n\
/mystats：我在本群的统计\n\
/categories：分类汇总\n\
/clear：清空本聊天的全部记录";

pub const USAGE_HINT: &str = "请发送格式：项目 金额，例如“早餐 15”";

pub const ADD_USAGE: &str = "用法：/add 金额 类别 描述，例如 /add -25 餐饮 午饭";

pub const STORE_FAILURE_REPLY: &str = "记账服务暂时不可用，请稍后再试。";

pub const NO_RECORDS: &str = "暂无记录。";

/// At most two decimals, trailing zeros trimmed: `15`, `15.5`, `-0.25`.
pub fn format_amount(amount: f64) -> String {
    let s = format!("{amount:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        return "0".to_string();
    }
    s.to_string()
}

pub fn format_recorded(rec: &ExpenseRecord) -> String {
    let amount = format_amount(rec.amount);
    let mut out = match &rec.category {
        Some(category) => format!("已记录：{category} - {amount} 元"),
        None => format!("已记录：{amount} 元"),
    };
    if let Some(desc) = &rec.description {
        out.push_str(&format!("（{desc}）"));
    }
    out
}

pub fn format_today_total(agg: &Aggregate) -> String {
    match agg.totals() {
        None => "今天还没有记录。".to_string(),
        Some(t) => format!("今天的合计是：{} 元", format_amount(t.total)),
    }
}

pub fn format_stats(agg: &Aggregate, title: &str, by: GroupBy) -> String {
    let Some(t) = agg.totals() else {
        return NO_RECORDS.to_string();
    };

    let mut lines = vec![
        title.to_string(),
        format!("收入：{} 元", format_amount(t.income)),
        format!("支出：{} 元", format_amount(t.expense)),
        format!("结余：{} 元", format_amount(t.balance)),
        format!("合计：{} 元（共 {} 笔）", format_amount(t.total), t.count),
    ];

    let heading = match by {
        GroupBy::None => None,
        GroupBy::Category => Some("分类明细："),
        GroupBy::User => Some("成员明细："),
    };
    if let Some(heading) = heading.filter(|_| !t.groups.is_empty()) {
        lines.push(String::new());
        lines.push(heading.to_string());
        for g in &t.groups {
            lines.push(format!(
                "• {}：{} 元（{} 笔）",
                g.label,
                format_amount(g.subtotal),
                g.count
            ));
        }
    }

    lines.join("\n")
}

/// Render a listing. `records` must already be newest first.
pub fn format_listing(records: &[ExpenseRecord], offset: FixedOffset) -> String {
    if records.is_empty() {
        return NO_RECORDS.to_string();
    }

    let mut lines = vec![format!("最近 {} 条记录：", records.len())];
    for rec in records {
        let when = rec.date.with_timezone(&offset).format("%m-%d %H:%M");
        let mut line = format!("{when} {} ", rec.username);
        if let Some(category) = &rec.category {
            line.push_str(category);
            line.push(' ');
        }
        line.push_str(&format!("{} 元", format_amount(rec.amount)));
        if let Some(desc) = &rec.description {
            line.push_str(&format!("（{desc}）"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn format_cleared(removed: usize) -> String {
    if removed == 0 {
        return "没有需要清空的记录。".to_string();
    }
    format!("已清空 {removed} 条记录。")
}
