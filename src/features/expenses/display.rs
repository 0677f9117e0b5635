//! 経費の表示用変換
//!
//! 経費種別名から単位を決め、金額を表示用文字列に整形します。

/// 距離として扱う経費種別名（小文字、部分一致）
const KILOMETER_TYPES: [&str; 2] = ["fahrkilometer", "kilometer"];

/// 距離単位
pub const KILOMETER_UNIT: &str = "km";
/// 通貨単位
pub const CURRENCY_UNIT: &str = "CHF";

/// 経費種別が走行距離かどうか（大文字小文字を区別しない）
pub fn is_kilometer_expense_type(expense_type_name: &str) -> bool {
    let lower = expense_type_name.to_lowercase();
    KILOMETER_TYPES.iter().any(|kind| lower.contains(kind))
}

/// 経費種別に応じた単位
pub fn get_expense_unit(expense_type_name: &str) -> &'static str {
    if is_kilometer_expense_type(expense_type_name) {
        KILOMETER_UNIT
    } else {
        CURRENCY_UNIT
    }
}

/// 金額を小数点以下2桁と単位で整形する
///
/// # 例
/// `format_expense_amount(12.5, "Kilometer")` は `"12.50 km"`
pub fn format_expense_amount(amount: f64, expense_type_name: &str) -> String {
    format!("{amount:.2} {}", get_expense_unit(expense_type_name))
}
