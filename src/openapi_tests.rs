#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;
    use utoipa::openapi::PathItemType;

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();

        assert!(openapi.components.is_some());
        let components = openapi.components.as_ref().unwrap();

        assert!(components.schemas.contains_key("ErrorResponse"));
        assert!(components.schemas.contains_key("HealthResponse"));
        assert!(components.schemas.contains_key("ClientResponse"));
        assert!(components.schemas.contains_key("MainMetrics"));

        // Verify that the schema can be serialized to JSON without errors
        let json_result = serde_json::to_string(&openapi);
        assert!(json_result.is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let error_response_schema = components.schemas.get("ErrorResponse").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = error_response_schema {
            let properties = &obj.properties;
            assert!(properties.contains_key("error"));
            assert!(properties.contains_key("code"));
            assert!(properties.contains_key("success"));
        } else {
            panic!("ErrorResponse should be an object schema");
        }
    }

    #[test]
    fn test_openapi_paths_contain_health_endpoint() {
        let openapi = ApiDoc::openapi();

        let health_path = openapi.paths.paths.get("/health").unwrap();
        let health_get_op = health_path.operations.get(&PathItemType::Get).unwrap();

        let responses = &health_get_op.responses;
        assert!(responses.responses.contains_key("200"));
        assert!(responses.responses.contains_key("500"));
    }

    #[test]
    fn test_route_groups_documented() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        for (path, method) in [
            ("/api/v1/auth/login", PathItemType::Post),
            ("/api/v1/users/register", PathItemType::Post),
            ("/api/v1/users/{user_id}", PathItemType::Delete),
            ("/api/v1/roles", PathItemType::Get),
            ("/api/v1/tarrif/add/{user_id}", PathItemType::Put),
            ("/api/v1/clients/create", PathItemType::Post),
            ("/api/v1/purchase/create/{client_id}", PathItemType::Post),
            ("/api/v1/visit/user", PathItemType::Get),
            ("/api/v1/report/main-metrics", PathItemType::Get),
            ("/api/v1/transaction/bill", PathItemType::Post),
            ("/api/v1/bank/buy/{plan}/{count}", PathItemType::Get),
            ("/api/v1/mail/verify", PathItemType::Post),
            ("/api/v1/manager/{manager_id}", PathItemType::Delete),
        ] {
            let item = paths
                .get(path)
                .unwrap_or_else(|| panic!("{path} is not documented"));
            assert!(item.operations.contains_key(&method), "{path} lacks {method:?}");
        }
    }

    #[test]
    fn test_guarded_routes_declare_bearer_security() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer"));

        let profile = openapi.paths.paths.get("/api/v1/users/profile").unwrap();
        let get = profile.operations.get(&PathItemType::Get).unwrap();
        assert!(get.security.as_ref().is_some_and(|s| !s.is_empty()));

        let login = openapi.paths.paths.get("/api/v1/auth/login").unwrap();
        let post = login.operations.get(&PathItemType::Post).unwrap();
        assert!(post.security.is_none());
    }

    #[test]
    fn test_error_responses_use_short_schema_name() {
        let openapi_json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(openapi_json.contains("#/components/schemas/ErrorResponse"));
    }
}
