// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 文案位于 locales/*.yml，键按模块分组: analytics.* / export.*
// 占位符格式 %{name}
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 当前全局语言（CLI 启动时按 ui.locale 设置）
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 按全局语言翻译，例如导出合计行 `t("export.project_total")`
pub fn t(key: &str) -> String {
    t_in(&current_locale(), key)
}

/// 按指定语言翻译，不修改全局语言
pub fn t_in(locale: &str, key: &str) -> String {
    rust_i18n::t!(key, locale = locale).to_string()
}

/// 按指定语言翻译并替换占位符
///
/// ```no_run
/// use supply_tracker::i18n::t_with_args_in;
/// let msg = t_with_args_in("en", "analytics.project_not_found", &[("project_id", "PRJ-1")]);
/// assert_eq!(msg, "Project not found: PRJ-1");
/// ```
pub fn t_with_args_in(locale: &str, key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(t_in(locale, key), |msg, (k, v)| {
        msg.replace(&format!("%{{{}}}", k), v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // rust-i18n 的 locale 为全局状态，且测试默认并行执行，这里串行化
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_global_locale_drives_t() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(current_locale(), "en");
        assert_eq!(t("export.project_total"), "Project total");

        set_locale("zh-CN");
        assert_eq!(t("export.project_total"), "项目合计");
    }

    #[test]
    fn test_explicit_locale_ignores_global() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        assert_eq!(t_in("en", "analytics.empty_project_id"), "Project ID must not be empty");
        assert_eq!(current_locale(), "zh-CN");
    }

    #[test]
    fn test_placeholders_replaced() {
        let msg = t_with_args_in("zh-CN", "analytics.refresh_failed", &[("reason", "database is locked")]);
        assert!(msg.contains("database is locked"));
        assert!(msg.contains("刷新失败"));

        let msg = t_with_args_in("en", "analytics.machine_not_found", &[("machine_id", "M-7")]);
        assert_eq!(msg, "Machine does not belong to the project: M-7");
    }
}
