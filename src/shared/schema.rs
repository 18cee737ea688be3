diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        password_hash -> Varchar,
        is_staff -> Bool,
        is_superuser -> Bool,
        is_active -> Bool,
        date_joined -> Timestamptz,
    }
}

diesel::table! {
    user_profiles (id) {
        id -> Uuid,
        user_id -> Uuid,
        role -> Varchar,
        department_id -> Nullable<Uuid>,
        phone -> Varchar,
        position -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    departments (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    registration_requests (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        phone -> Varchar,
        department_id -> Nullable<Uuid>,
        position -> Varchar,
        requested_role -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        reviewed_at -> Nullable<Timestamptz>,
        reviewed_by -> Nullable<Uuid>,
        rejection_reason -> Text,
        credential -> Varchar,
    }
}

diesel::table! {
    articles (id) {
        id -> Uuid,
        title -> Varchar,
        content -> Text,
        image -> Nullable<Varchar>,
        video -> Nullable<Varchar>,
        audio -> Nullable<Varchar>,
        author_id -> Nullable<Uuid>,
        pub_date -> Timestamptz,
    }
}

diesel::table! {
    requests (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Text,
        category -> Varchar,
        status -> Varchar,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    comments (id) {
        id -> Uuid,
        text -> Text,
        article_id -> Nullable<Uuid>,
        request_id -> Nullable<Uuid>,
        user_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(user_profiles -> users (user_id));
diesel::joinable!(user_profiles -> departments (department_id));
diesel::joinable!(registration_requests -> departments (department_id));
diesel::joinable!(registration_requests -> users (reviewed_by));
diesel::joinable!(articles -> users (author_id));
diesel::joinable!(requests -> users (created_by));
diesel::joinable!(comments -> articles (article_id));
diesel::joinable!(comments -> requests (request_id));
diesel::joinable!(comments -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    user_profiles,
    departments,
    registration_requests,
    articles,
    requests,
    comments,
);
