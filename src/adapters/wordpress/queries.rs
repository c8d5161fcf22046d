pub(crate) const GENERAL_SETTINGS: &str = "query { generalSettings { title } }";

pub(crate) const LOGIN: &str = r"
mutation LoginUser($username: String!, $password: String!) {
  login(input: { username: $username, password: $password }) {
    authToken
    refreshToken
    user {
      id
      username
      email
      firstName
      lastName
      nicename
      roles { nodes { name } }
    }
  }
}";

pub(crate) const REGISTER_USER: &str = r"
mutation RegisterUser($username: String!, $email: String!, $password: String!, $firstName: String, $lastName: String) {
  registerUser(input: {
    username: $username
    email: $email
    password: $password
    firstName: $firstName
    lastName: $lastName
  }) {
    user { id }
  }
}";

pub(crate) const REFRESH_AUTH_TOKEN: &str = r"
mutation RefreshAuthToken($refreshToken: String!) {
  refreshJwtAuthToken(input: { jwtRefreshToken: $refreshToken }) {
    authToken
  }
}";

pub(crate) const VIEWER: &str = r"
query ValidateToken {
  viewer {
    id
    username
    email
    firstName
    lastName
    nicename
    roles { nodes { name } }
  }
}";
