// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod routing_tests {
    //! 路由表的性质测试
    //!
    //! 用 proptest 随机生成路径，检验查找结果的确定性、精确路由的优先级与整串匹配。

    use proptest::prelude::*;
    use webframe::{action::Handler, router::Router, HttpRequestMethod, Scope};

    const GET: HttpRequestMethod = HttpRequestMethod::Get;

    fn handler(name: &'static str) -> Handler {
        Handler::func(move |_: &mut Scope<'_>| name)
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.add("/item/(\\d+)", &[GET], handler("item")).unwrap();
        router.add("/item/latest", &[GET], handler("latest")).unwrap();
        router.add("/(\\w+)/(\\w+)", &[GET], handler("pair")).unwrap();
        router.add("/.*", &[GET], handler("catch-all")).unwrap();
        router
    }

    proptest! {
        #[test]
        fn lookup_is_deterministic(id in 0u64..1_000_000_000) {
            let router = router();
            let path = format!("/item/{}", id);
            let (first, first_args) = router.find(&path, GET).unwrap();
            let (second, second_args) = router.find(&path, GET).unwrap();
            prop_assert_eq!(first.pattern(), second.pattern());
            prop_assert_eq!(first.pattern(), "/item/(\\d+)");
            prop_assert_eq!(&first_args, &second_args);
            prop_assert_eq!(first_args, vec![id.to_string()]);
        }

        #[test]
        fn literal_route_beats_any_regex(segment in "[a-z]{1,12}") {
            let mut router = router();
            let path = format!("/page/{}", segment);
            router.add(&path, &[GET], handler("page")).unwrap();

            let (route, args) = router.find(&path, GET).unwrap();
            prop_assert!(route.is_literal());
            prop_assert_eq!(route.pattern(), path.as_str());
            prop_assert!(args.is_empty());
        }

        #[test]
        fn regex_must_match_whole_path(id in 0u64..1_000_000, suffix in "[a-z]{1,6}") {
            let router = router();
            let path = format!("/item/{}{}", id, suffix);
            let (route, _) = router.find(&path, GET).unwrap();
            prop_assert_ne!(route.pattern(), "/item/(\\d+)");
        }

        #[test]
        fn unregistered_method_never_matches(path in "/[a-z/]{0,20}") {
            let router = router();
            prop_assert!(router.find(&path, HttpRequestMethod::Delete).is_none());
        }
    }

    #[test]
    fn test_hyphenated_path_beats_earlier_catch_all() {
        let mut router = Router::new();
        router.add("/(.*)", &[GET], handler("regex")).unwrap();
        router.add("/user-list", &[GET], handler("exact")).unwrap();

        let (route, args) = router.find("/user-list", GET).unwrap();
        assert!(route.is_literal());
        assert!(args.is_empty());

        let (route, args) = router.find("/user-detail", GET).unwrap();
        assert!(!route.is_literal());
        assert_eq!(args, vec!["user-detail".to_string()]);
    }

    #[test]
    fn test_latest_is_exact_not_numeric() {
        let router = router();
        let (route, args) = router.find("/item/latest", GET).unwrap();
        assert!(route.is_literal());
        assert!(args.is_empty());

        let (route, args) = router.find("/item/latest/", GET).unwrap();
        assert_eq!(route.pattern(), "/item/latest");
        assert!(args.is_empty());
    }
}
