macro_rules! register_collectors {
    (
        $(
            $module:ident => $collector_type:ident
        ),* $(,)?
    ) => {
        $(
            pub mod $module;
            pub use $module::$collector_type;
        )*

        #[derive(Clone)]
        pub enum CollectorType {
            $(
                $collector_type($collector_type),
            )*
        }

        impl Collector for CollectorType {
            fn name(&self) -> &'static str {
                match self {
                    $(
                        CollectorType::$collector_type(c) => c.name(),
                    )*
                }
            }

            fn enabled_by_default(&self) -> bool {
                match self {
                    $(
                        CollectorType::$collector_type(c) => c.enabled_by_default(),
                    )*
                }
            }

            fn collect<'a, S: StatSource>(
                &'a self,
                source: &'a S,
                version: Option<&'a ServerVersion>,
                sink: &'a dyn MetricSink,
            ) -> impl Future<Output = Result<(), ScrapeError>> + Send + 'a {
                async move {
                    match self {
                        $(
                            CollectorType::$collector_type(c) => {
                                c.collect(source, version, sink).await
                            }
                        )*
                    }
                }
            }
        }

        /// Constructors keyed by collector name.
        pub fn all_factories() -> HashMap<&'static str, fn() -> CollectorType> {
            let mut map: HashMap<&'static str, fn() -> CollectorType> = HashMap::new();
            $(
                map.insert(
                    stringify!($module),
                    || CollectorType::$collector_type($collector_type::new()),
                );
            )*
            map
        }

        /// Names of every registered collector, used to build the CLI flags.
        pub const COLLECTOR_NAMES: &[&'static str] = &[
            $(stringify!($module),)*
        ];
    };
}
