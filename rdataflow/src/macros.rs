/// Build a transition table: every state maps to the states it may move to.
/// A state without an entry is terminal.
macro_rules! transitions {
    ($($from:expr => [$($to:expr),* $(,)?]),* $(,)?) => {{
        let mut table = std::collections::HashMap::new();
        $(
            table.insert($from, vec![$($to),*]);
        )*
        table
    }};
}
