use stackchart_protocol::{
    CallNodeDisplayData, CallNodeIndex, FuncIndex, InliningBadge, OriginIcon, category_pair_label,
    format_percent,
};

use super::CallTree;
use crate::model::{InlinedInto, ResourceType, Thread};

const MAX_LIB_CHARS: usize = 1000;
const ZERO: &str = "—";

impl CallTree<'_> {
    pub(super) fn compute_display_data(&self, node: CallNodeIndex) -> CallNodeDisplayData {
        let data = self.node_data(node);
        let table = self.call_node_table();
        let func = table.func(node);
        let resource = self.thread.func_table.resource[func.index()];

        let weight_type = self.weight_type;
        let total = weight_type.format_value(data.total, self.is_high_precision);
        let self_time = weight_type.format_value(data.self_time, self.is_high_precision);
        let total_with_unit = weight_type.with_unit(&total);
        let self_with_unit = weight_type.with_unit(&self_time);
        let total_percent = format_percent(data.total_relative);
        let aria_label = weight_type.aria_label(
            &data.func_name,
            &total_with_unit,
            &total_percent,
            &self_with_unit,
        );

        let category = table.category(node);
        CallNodeDisplayData {
            total: zero_as_dash(data.total, total),
            total_with_unit: zero_as_dash(data.total, total_with_unit),
            total_percent,
            self_time: zero_as_dash(data.self_time, self_time),
            self_with_unit: zero_as_dash(data.self_time, self_with_unit),
            lib: truncate_chars(origin_annotation(self.thread, func), MAX_LIB_CHARS),
            is_frame_label: resource.is_none(),
            category_name: category_pair_label(self.categories, category, table.subcategory(node)),
            category_color: self.categories[category].color,
            icon: resource.and_then(|resource| origin_icon(self.thread, resource)),
            aria_label,
            badge: inlining_badge(self.thread, table.inlined_into(node), &data.func_name),
            name: data.func_name,
        }
    }
}

fn zero_as_dash(value: f64, formatted: String) -> String {
    if value == 0.0 { ZERO.to_owned() } else { formatted }
}

fn truncate_chars(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => s[..end].to_owned(),
        None => s,
    }
}

/// Where a function comes from: `"resource: file:line:column"`, or whichever
/// part is known. The resource name is left out when the file name already
/// starts with it (scripts named by URL).
fn origin_annotation(thread: &Thread, func: FuncIndex) -> String {
    let funcs = &thread.func_table;
    let index = func.index();
    let origin = funcs.resource[index].map(|resource| {
        let name = thread.resource_table.name[resource];
        thread.string_table.get(name)
    });
    let file = funcs.file_name[index].map(|file_name| {
        let mut file = thread.string_table.get(file_name).to_string();
        if let Some(line) = funcs.line_number[index] {
            file = format!("{file}:{line}");
            if let Some(column) = funcs.column_number[index] {
                file = format!("{file}:{column}");
            }
        }
        file
    });

    match (origin, file) {
        (Some(origin), Some(file)) if !file.starts_with(origin.as_str()) => {
            format!("{origin}: {file}")
        }
        (_, Some(file)) => file,
        (Some(origin), None) => origin.to_string(),
        (None, None) => String::new(),
    }
}

fn origin_icon(thread: &Thread, resource: usize) -> Option<OriginIcon> {
    let name = thread.string_table.get(thread.resource_table.name[resource]);
    match thread.resource_table.resource_type[resource] {
        ResourceType::Webhost => favicon_url(name).map(|url| OriginIcon::Favicon { url }),
        ResourceType::Addon => Some(OriginIcon::Extension {
            name: name.to_string(),
        }),
        _ => None,
    }
}

/// Favicon for an `https` origin. Plain http favicons would be mixed content.
fn favicon_url(origin: &str) -> Option<String> {
    let rest = origin.strip_prefix("https://")?;
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .filter(|host| !host.is_empty())?;
    Some(format!("https://{host}/favicon.ico"))
}

fn inlining_badge(
    thread: &Thread,
    inlined: Option<InlinedInto>,
    func_name: &str,
) -> Option<InliningBadge> {
    match inlined? {
        InlinedInto::Divergent => Some(InliningBadge::DivergentInlining {
            called_function: func_name.to_owned(),
        }),
        InlinedInto::Symbol(symbol) => {
            let outer = thread.string_table.get(thread.native_symbols.name[symbol]);
            (outer.as_str() != func_name).then(|| InliningBadge::Inlined {
                called_function: func_name.to_owned(),
                outer_function: outer.to_string(),
            })
        }
    }
}
